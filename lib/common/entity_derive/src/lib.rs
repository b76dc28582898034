use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, Meta, Token};

/// 表名、模型名的最大长度（与 history 表的列宽一致）
const MAX_LABEL_LEN: usize = 100;

/// Trackable derive macro - 自动实现 `diff::Trackable`
///
/// # 属性
/// - `#[trackable(app_label = "auth")]` - 指定 app_label（默认为当前 crate 名）
/// - `#[trackable(model = "user")]` - 指定模型名（默认为结构体名，统一转为小写）
/// - `#[trackable(id = "pk")]` - 指定主键字段（默认为 `id`），字段类型需实现 `Into<u64> + Clone`
///
/// 快照来自 `Serialize` 的输出，不想进入审计的字段用 `#[serde(skip)]`
/// 或在注册时 exclude。
///
/// # 示例
/// ```ignore
/// #[derive(Serialize, entity_derive::Trackable)]
/// #[trackable(app_label = "auth", model = "user")]
/// struct User {
///     id: u64,
///     username: String,
///     #[serde(skip)]
///     cached_permissions: Vec<String>,
/// }
/// ```
#[proc_macro_derive(Trackable, attributes(trackable))]
pub fn derive_trackable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let attrs = TrackableAttrs::parse(input)?;

    let id_field = attrs.id.unwrap_or_else(|| Ident::new("id", name.span()));
    ensure_field_exists(input, &id_field)?;

    let model = attrs.model.unwrap_or_else(|| name.to_string()).to_lowercase();
    check_label("model", &model, name)?;

    let app_label = match attrs.app_label {
        Some(label) => {
            check_label("app_label", &label, name)?;
            quote! { #label }
        }
        None => quote! { env!("CARGO_PKG_NAME") },
    };

    Ok(quote! {
        impl #impl_generics ::diff::Trackable for #name #ty_generics #where_clause {
            fn entity_type() -> ::diff::EntityType {
                ::diff::EntityType::new_static(#app_label, #model)
            }

            fn source_id(&self) -> u64 {
                ::core::convert::Into::<u64>::into(::core::clone::Clone::clone(&self.#id_field))
            }
        }
    })
}

// ============================================================================
// Helper Functions
// ============================================================================

#[derive(Default)]
struct TrackableAttrs {
    app_label: Option<String>,
    model: Option<String>,
    id: Option<Ident>,
}

impl TrackableAttrs {
    fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let mut attrs = Self::default();

        for attr in &input.attrs {
            if !attr.path().is_ident("trackable") {
                continue;
            }
            let items = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
            for item in items {
                let nv = match item {
                    Meta::NameValue(nv) => nv,
                    other => {
                        return Err(syn::Error::new_spanned(other, "expected `key = \"value\"`"))
                    }
                };
                let value = match &nv.value {
                    syn::Expr::Lit(syn::ExprLit { lit: syn::Lit::Str(s), .. }) => s.clone(),
                    other => return Err(syn::Error::new_spanned(other, "expected a string literal")),
                };

                if nv.path.is_ident("app_label") {
                    attrs.app_label = Some(value.value());
                } else if nv.path.is_ident("model") {
                    attrs.model = Some(value.value());
                } else if nv.path.is_ident("id") {
                    attrs.id = Some(Ident::new(&value.value(), value.span()));
                } else {
                    return Err(syn::Error::new_spanned(
                        &nv.path,
                        "unknown trackable attribute, expected `app_label`, `model` or `id`",
                    ));
                }
            }
        }

        Ok(attrs)
    }
}

/// 主键字段必须是具名字段之一
fn ensure_field_exists(input: &DeriveInput, id_field: &Ident) -> syn::Result<()> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(&input.ident, "Trackable 只支持结构体"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(&input.ident, "Trackable 只支持具名字段的结构体"));
    };

    if fields.named.iter().any(|f| f.ident.as_ref() == Some(id_field)) {
        Ok(())
    } else {
        Err(syn::Error::new_spanned(
            id_field,
            format!("no field named `{id_field}`, use #[trackable(id = \"...\")]"),
        ))
    }
}

fn check_label(kind: &str, value: &str, span: &Ident) -> syn::Result<()> {
    if value.is_empty() {
        return Err(syn::Error::new_spanned(span, format!("{kind} cannot be empty")));
    }
    if value.len() > MAX_LABEL_LEN {
        return Err(syn::Error::new_spanned(
            span,
            format!("{kind} '{value}' is longer than {MAX_LABEL_LEN} characters"),
        ));
    }
    // source_type 以 `app_label.model` 存储，标签本身不能含 '.'
    if value.contains('.') {
        return Err(syn::Error::new_spanned(span, format!("{kind} '{value}' cannot contain '.'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proc_macro2::Span;

    fn span() -> Ident {
        Ident::new("User", Span::call_site())
    }

    #[test]
    fn test_check_label_accepts_plain_labels() {
        assert!(check_label("app_label", "auth", &span()).is_ok());
        assert!(check_label("model", &"m".repeat(MAX_LABEL_LEN), &span()).is_ok());
    }

    #[test]
    fn test_check_label_rejects_bad_labels() {
        assert!(check_label("model", "", &span()).is_err());
        assert!(check_label("model", &"m".repeat(MAX_LABEL_LEN + 1), &span()).is_err());

        let err = check_label("app_label", "django.contrib", &span()).unwrap_err();
        assert_eq!(err.to_string(), "app_label 'django.contrib' cannot contain '.'");
        assert!(check_label("model", "auth.user", &span()).is_err());
    }

    #[test]
    fn test_explicit_model_is_lower_cased() {
        let input: DeriveInput = syn::parse_quote! {
            #[trackable(app_label = "shop", model = "PurchaseItem")]
            struct Item { id: u64 }
        };
        let tokens = expand(&input).unwrap().to_string();
        assert!(tokens.contains("\"purchaseitem\""));
        assert!(!tokens.contains("PurchaseItem\""));
    }
}
