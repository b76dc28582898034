use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Immutable 属性宏 - 将结构体标记为只读记录
///
/// # 功能
/// - 生成 `pub const fn new`，按字段声明顺序接收全部字段
/// - 为每个字段生成返回不可变引用的 getter
///
/// # 编译时检查
/// - 只接受具名字段的结构体
/// - 检测到 `pub` 字段直接报编译错误，字段只能经由 getter 读取
///
/// # 示例
/// ```ignore
/// #[immutable]
/// pub struct LogEntry {
///     id: u64,
///     fields: FieldMap,
/// }
///
/// let entry = LogEntry::new(1, FieldMap::new());
/// assert_eq!(*entry.id(), 1);
/// ```
#[proc_macro_attribute]
pub fn immutable(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        let args = proc_macro2::TokenStream::from(args);
        return syn::Error::new_spanned(args, "#[immutable] 不接受参数").to_compile_error().into();
    }
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            other => {
                return Err(syn::Error::new_spanned(other, "#[immutable] 只支持具名字段的结构体"))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "#[immutable] 只支持结构体")),
    };

    let mut names = Vec::with_capacity(fields.len());
    let mut types = Vec::with_capacity(fields.len());
    for field in fields {
        if matches!(field.vis, syn::Visibility::Public(_)) {
            return Err(syn::Error::new_spanned(
                &field.vis,
                "#[immutable] 结构体的字段不能是 `pub`，请通过生成的 getter 访问",
            ));
        }
        // 具名字段一定带 ident
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        names.push(ident);
        types.push(&field.ty);
    }

    let getters = names.iter().zip(types.iter()).map(|(field_name, field_type)| {
        quote! {
            #[inline]
            pub const fn #field_name(&self) -> &#field_type {
                &self.#field_name
            }
        }
    });

    Ok(quote! {
        #input

        impl #impl_generics #name #ty_generics #where_clause {
            /// 由 `#[immutable]` 生成的构造函数
            #[inline]
            #[allow(clippy::too_many_arguments)]
            pub const fn new(#(#names: #types),*) -> Self {
                Self { #(#names),* }
            }

            #(#getters)*
        }
    })
}
