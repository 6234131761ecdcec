//! Attribute parsing for the `#[jbridge(...)]` helper attribute.

use syn::{Attribute, LitStr};

/// Parsed `#[jbridge(...)]` attributes on a mirrored type.
#[derive(Default)]
pub struct MirrorAttrs {
    /// Scoped class name, `::` separated.
    pub class: Option<LitStr>,
    /// Internal name override, `/` and `$` separated.
    pub descriptor: Option<LitStr>,
    /// Also implement `StringClass`.
    pub string: bool,
}

/// Parsed `#[jbridge(...)]` attributes on a field.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    /// Field holds no handles.
    pub skip: bool,
}

fn is_jbridge(attr: &Attribute) -> bool {
    attr.path().is_ident("jbridge")
}

fn unknown(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Error {
    meta.error(format!(
        "unknown jbridge attribute: {}",
        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
    ))
}

impl MirrorAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs.iter().filter(|a| is_jbridge(a)) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("class") {
                    let value: LitStr = meta.value()?.parse()?;
                    validate_scoped(&value)?;
                    result.class = Some(value);
                } else if meta.path.is_ident("descriptor") {
                    let value: LitStr = meta.value()?.parse()?;
                    validate_internal(&value)?;
                    result.descriptor = Some(value);
                } else if meta.path.is_ident("string") {
                    result.string = true;
                } else {
                    return Err(unknown(&meta));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }
}

impl FieldAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs.iter().filter(|a| is_jbridge(a)) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    result.skip = true;
                    Ok(())
                } else {
                    Err(unknown(&meta))
                }
            })?;
        }

        Ok(result)
    }
}

/// `a::b::C`: non-empty segments of identifier characters.
fn validate_scoped(lit: &LitStr) -> syn::Result<()> {
    let value = lit.value();
    let valid = !value.is_empty()
        && value
            .split("::")
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'));
    if valid {
        Ok(())
    } else {
        Err(syn::Error::new(lit.span(), format!("invalid scoped class name '{value}'")))
    }
}

/// `a/b/C$D`: no descriptor punctuation, no empty segments.
fn validate_internal(lit: &LitStr) -> syn::Result<()> {
    let value = lit.value();
    let valid = !value.is_empty()
        && !value.contains([';', '[', '.', '(', ')'])
        && value.split('/').all(|seg| !seg.is_empty());
    if valid {
        Ok(())
    } else {
        Err(syn::Error::new(lit.span(), format!("invalid internal class name '{value}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn parses_class_and_descriptor() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[jbridge(class = "java::util::Map::Entry", descriptor = "java/util/Map$Entry")])];
        let parsed = MirrorAttrs::from_attrs(&attrs).unwrap();
        assert_eq!(parsed.class.unwrap().value(), "java::util::Map::Entry");
        assert_eq!(parsed.descriptor.unwrap().value(), "java/util/Map$Entry");
        assert!(!parsed.string);
    }

    #[test]
    fn ignores_other_attributes() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[doc = "x"]), parse_quote!(#[jbridge(string)])];
        let parsed = MirrorAttrs::from_attrs(&attrs).unwrap();
        assert!(parsed.class.is_none());
        assert!(parsed.string);
    }

    #[test]
    fn rejects_bad_names() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[jbridge(class = "java::::Thing")])];
        assert!(MirrorAttrs::from_attrs(&attrs).is_err());
        let attrs: Vec<Attribute> = vec![parse_quote!(#[jbridge(descriptor = "Ljava/lang/Thing;")])];
        assert!(MirrorAttrs::from_attrs(&attrs).is_err());
        let attrs: Vec<Attribute> = vec![parse_quote!(#[jbridge(nope)])];
        assert!(MirrorAttrs::from_attrs(&attrs).is_err());
    }

    #[test]
    fn field_skip() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[jbridge(skip)])];
        assert!(FieldAttrs::from_attrs(&attrs).unwrap().skip);
        assert!(!FieldAttrs::from_attrs(&[]).unwrap().skip);
    }
}
