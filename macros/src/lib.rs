//! Code generation for `http-dispatch` handler holders.
//!
//! `#[handler_set]` scans an inherent `impl` block and emits the export table
//! that `NameDispatcher` resolves derived identifiers against, so handler
//! discovery happens once at compile time instead of on every request.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    FnArg, ImplItem, ImplItemFn, ItemImpl, LitStr, Path, Token, Visibility,
    ext::IdentExt,
    parse::{Parse, ParseStream},
    parse_macro_input,
};

/// Arguments for the `#[handler_set]` macro.
struct HandlerSetArgs {
    krate: Path,
}

impl Parse for HandlerSetArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(HandlerSetArgs {
                krate: syn::parse_quote!(::http_dispatch::http::named),
            });
        }

        input.parse::<Token![crate]>()?;
        input.parse::<Token![=]>()?;
        let krate: Path = input.parse()?;

        if input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
        }
        if !input.is_empty() {
            return Err(input.error("unexpected tokens after `crate = <path>`"));
        }

        Ok(HandlerSetArgs { krate })
    }
}

/// Export the public handler methods of an inherent `impl` block.
///
/// A method is exported when it is `pub`, takes `&self` and exactly two more
/// arguments (the request context and the response sink), and is neither
/// `async` nor generic. Everything else in the block is left alone and is
/// unreachable through name-derived dispatch.
///
/// ```rust,ignore
/// #[handler_set]
/// #[allow(non_snake_case)]
/// impl Pages {
///     pub fn Index_GET(&self, _ctx: &RequestContext, w: &mut ResponseWriter) {
///         w.write_text("Index");
///     }
/// }
/// ```
///
/// Generated code refers to `::http_dispatch::http::named`; pass
/// `#[handler_set(crate = path::to::named)]` to point it elsewhere.
#[proc_macro_attribute]
pub fn handler_set(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as HandlerSetArgs);
    let input = parse_macro_input!(item as ItemImpl);

    expand(args, input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(args: HandlerSetArgs, input: ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &input.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[handler_set] must be placed on an inherent impl block",
        ));
    }

    let krate = &args.krate;
    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    let idents: Vec<_> = input
        .items
        .iter()
        .filter_map(|item| match item {
            ImplItem::Fn(f) if is_exported(f) => Some(&f.sig.ident),
            _ => None,
        })
        .collect();

    let names: Vec<_> = idents
        .iter()
        .map(|ident| LitStr::new(&ident.unraw().to_string(), ident.span()))
        .collect();

    Ok(quote! {
        #input

        impl #impl_generics #krate::HandlerHolder for #self_ty #where_clause {
            fn exports() -> ::std::vec::Vec<(&'static str, #krate::NamedHandler<Self>)> {
                ::std::vec![
                    #( (#names, Self::#idents as #krate::NamedHandler<Self>) ),*
                ]
            }
        }
    })
}

fn is_exported(f: &ImplItemFn) -> bool {
    let public = matches!(f.vis, Visibility::Public(_));
    let by_ref = matches!(
        f.sig.inputs.first(),
        Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none()
    );

    public
        && by_ref
        && f.sig.inputs.len() == 3
        && f.sig.asyncness.is_none()
        && f.sig.generics.params.is_empty()
}
