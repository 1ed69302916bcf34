use syn::{Attribute, Error, LitStr, Result};

///
/// StructAttrs
///

#[derive(Default)]
pub struct StructAttrs {
    pub table: Option<String>,
}

impl StructAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("crud")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    out.table = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported #[crud] struct attribute"))
                }
            })?;
        }
        Ok(out)
    }
}

///
/// Embed
///

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Embed {
    None,
    Base,
    ContentBase,
}

///
/// FieldAttrs
///

#[derive(Default)]
pub struct FieldAttrs {
    pub embed: Option<Embed>,
    pub contents: bool,
    pub foreign_key: Option<String>,
    pub skip: bool,
    pub sql_type: Option<String>,
    pub default: Option<String>,
    pub index: bool,
    pub validate: Option<String>,
    /// `#[serde(rename = "...")]`, picked up so wire keys match serde.
    pub rename: Option<String>,
    pub serde_flatten: bool,
}

impl FieldAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = Self::default();
        for attr in attrs {
            if attr.path().is_ident("crud") {
                out.parse_crud(attr)?;
            } else if attr.path().is_ident("serde") {
                out.parse_serde(attr)?;
            }
        }

        if out.embed.is_some() && out.contents {
            return Err(Error::new_spanned(
                &attrs[0],
                "a field cannot be both an embedded base and a contents collection",
            ));
        }

        Ok(out)
    }

    pub fn embed(&self) -> Embed {
        self.embed.unwrap_or(Embed::None)
    }

    fn parse_crud(&mut self, attr: &Attribute) -> Result<()> {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("base") {
                self.embed = Some(Embed::Base);
            } else if meta.path.is_ident("content_base") {
                self.embed = Some(Embed::ContentBase);
            } else if meta.path.is_ident("skip") {
                self.skip = true;
            } else if meta.path.is_ident("index") {
                self.index = true;
            } else if meta.path.is_ident("contents") {
                self.contents = true;
                if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("foreign_key") {
                            self.foreign_key = Some(inner.value()?.parse::<LitStr>()?.value());
                            Ok(())
                        } else {
                            Err(inner.error("expected `foreign_key = \"...\"`"))
                        }
                    })?;
                }
            } else if meta.path.is_ident("sql_type") {
                self.sql_type = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("default") {
                self.default = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("validate") {
                self.validate = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("unsupported #[crud] field attribute"));
            }
            Ok(())
        })
    }

    // Other serde options are left to serde itself.
    fn parse_serde(&mut self, attr: &Attribute) -> Result<()> {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                self.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("flatten") {
                self.serde_flatten = true;
            } else if meta.input.peek(syn::Token![=]) {
                let _ = meta.value()?.parse::<syn::Expr>()?;
            } else if meta.input.peek(syn::token::Paren) {
                let _ = meta.input.parse::<proc_macro2::Group>()?;
            }
            Ok(())
        })
    }
}
