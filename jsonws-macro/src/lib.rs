//! # jsonws Procedural Macros
//!
//! ## `#[service]` Macro
//!
//! Turns a trait into a web service contract. It generates:
//! - `PATH`, the base path given as `#[service(path = "...")]`
//! - `jsonws_descriptor`, which lists one endpoint per method for
//!   `Router::bind`
//! - an implementation of the trait for `jsonws::Proxy`, forwarding every
//!   call to the remote endpoint
//!
//! ### Example
//!
//! ```rust,ignore
//! #[jsonws::service(path = "/json")]
//! pub trait Greeter {
//!     #[web_method(name = "remoteCallMe")]
//!     async fn remote_call_me(&self, req: &Request) -> jsonws::Result<Response>;
//!     async fn ping(&self) -> jsonws::Result<()>;
//! }
//! ```
//!
//! ### Requirements
//!
//! Service methods must be `async fn`, take `&self`, and return
//! `Result<T>`. A method is exposed under its own name unless
//! `#[web_method(name = "...")]` overrides it. Methods with more than one
//! parameter besides `&self` are not exposed, and calling them on a proxy
//! fails with `TooManyArguments`. Proxy stubs pass their argument through
//! `Proxy::invoke`, so an argument serializing to `null` is sent as `{}`.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    FnArg, ItemTrait, LitStr, Pat, ReturnType, TraitItem, Type, parse::Parser, parse_macro_input,
};

/// Procedural macro for defining web services.
///
/// # Panics
///
/// Panics at compile time if:
/// - a method is not an `async fn` taking `&self` and returning a type
/// - a method is named `jsonws_descriptor` (reserved name)
/// - the attribute arguments are not `path = "..."`
#[proc_macro_attribute]
pub fn service(attr: TokenStream, input: TokenStream) -> TokenStream {
    let mut path: Option<String> = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("path") {
            path = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else {
            Err(meta.error("unsupported service argument, expected `path`"))
        }
    });
    if let Err(err) = parser.parse(attr) {
        return err.to_compile_error().into();
    }

    let mut input = parse_macro_input!(input as ItemTrait);
    let trait_ident = input.ident.clone();
    let visibility = input.vis.clone();
    let trait_name = trait_ident.to_string();

    let krate = get_crate_name();
    let path_const = match &path {
        Some(path) => quote! { ::std::option::Option::Some(#path) },
        None => quote! { ::std::option::Option::None },
    };

    let mut trait_methods = vec![];
    let mut descriptor_methods = vec![];
    let mut proxy_methods = vec![];

    for item in &mut input.items {
        let TraitItem::Fn(method) = item else {
            trait_methods.push(quote! { #item });
            continue;
        };

        let exposed_name = match take_web_method_name(&mut method.attrs) {
            Ok(name) => name.unwrap_or_else(|| method.sig.ident.to_string()),
            Err(err) => return err.to_compile_error().into(),
        };

        let method_ident = &method.sig.ident;
        if *method_ident == "jsonws_descriptor" {
            panic!("the function cannot be named `jsonws_descriptor`!");
        }
        let (Some(_), Some(receiver), ReturnType::Type(_, rsp_type)) = (
            method.sig.asyncness,
            method.sig.receiver(),
            &method.sig.output,
        ) else {
            panic!(
                "the function should be in the form `async fn func(&self, req: &Req) -> Result<Rsp>`."
            );
        };
        let receiver = receiver.clone();

        let mut arg_idents = vec![];
        let mut arg_types = vec![];
        for (idx, arg) in method.sig.inputs.iter().skip(1).enumerate() {
            let FnArg::Typed(arg) = arg else {
                panic!("unexpected receiver in `{trait_name}::{method_ident}`");
            };
            let ident = match &*arg.pat {
                Pat::Ident(pat) => pat.ident.clone(),
                _ => format_ident!("arg{idx}"),
            };
            arg_idents.push(ident);
            arg_types.push((*arg.ty).clone());
        }

        let attrs = &method.attrs;
        let sig_ident = method_ident.clone();
        let generics = &method.sig.generics;
        let params = arg_idents
            .iter()
            .zip(&arg_types)
            .map(|(ident, ty)| quote! { #ident: #ty });
        let params = quote! { #(#params),* };

        // The trait method returns a `Send` future so that the descriptor can
        // run it on any worker.
        let default_body = method.default.as_ref();
        match default_body {
            Some(body) => trait_methods.push(quote! {
                #(#attrs)*
                fn #sig_ident #generics(#receiver, #params) -> impl ::std::future::Future<Output = #rsp_type> + ::std::marker::Send {
                    async move #body
                }
            }),
            None => trait_methods.push(quote! {
                #(#attrs)*
                fn #sig_ident #generics(#receiver, #params) -> impl ::std::future::Future<Output = #rsp_type> + ::std::marker::Send;
            }),
        }

        match arg_types.as_slice() {
            [] => {
                descriptor_methods.push(quote! {
                    let this = self.clone();
                    let descriptor = descriptor.method(#exposed_name, move |_: #krate::Empty| {
                        let this = this.clone();
                        async move { this.#method_ident().await }
                    });
                });
                proxy_methods.push(quote! {
                    async fn #method_ident(#receiver) -> #rsp_type {
                        self.call_empty(#exposed_name).await
                    }
                });
            }
            [arg_type] => {
                let (req_type, arg_expr) = match arg_type {
                    Type::Reference(reference) => {
                        let elem = &reference.elem;
                        (quote! { #elem }, quote! { &req })
                    }
                    ty => (quote! { #ty }, quote! { req }),
                };
                let arg_ident = &arg_idents[0];
                descriptor_methods.push(quote! {
                    let this = self.clone();
                    let descriptor = descriptor.method(#exposed_name, move |req: #req_type| {
                        let this = this.clone();
                        async move { this.#method_ident(#arg_expr).await }
                    });
                });
                proxy_methods.push(quote! {
                    async fn #method_ident(#receiver, #arg_ident: #arg_type) -> #rsp_type {
                        let args = ::std::vec![#krate::to_value(&#arg_ident)?];
                        self.invoke(#exposed_name, args).await
                    }
                });
            }
            _ => {
                let params = arg_idents
                    .iter()
                    .zip(&arg_types)
                    .map(|(ident, ty)| quote! { #ident: #ty });
                proxy_methods.push(quote! {
                    async fn #method_ident(#receiver, #(#params),*) -> #rsp_type {
                        let args = ::std::vec![#(#krate::to_value(&#arg_idents)?),*];
                        self.invoke(#exposed_name, args).await
                    }
                });
            }
        }
    }

    let trait_attrs = &input.attrs;
    let supertraits = &input.supertraits;
    let colon = input.colon_token;
    let generics = &input.generics;

    quote! {
        #(#trait_attrs)*
        #visibility trait #trait_ident #generics #colon #supertraits {
            const NAME: &'static str = #trait_name;
            const PATH: ::std::option::Option<&'static str> = #path_const;

            #(#trait_methods)*

            fn jsonws_descriptor(self: ::std::sync::Arc<Self>) -> #krate::ServiceDescriptor
            where
                Self: ::std::marker::Sized + ::std::marker::Send + ::std::marker::Sync + 'static,
            {
                let descriptor = #krate::ServiceDescriptor::new(Self::PATH);
                #(#descriptor_methods)*
                descriptor
            }
        }

        impl #trait_ident for #krate::Proxy {
            #(#proxy_methods)*
        }
    }
    .into()
}

/// Removes `#[web_method]` attributes, returning the `name` override if any.
fn take_web_method_name(attrs: &mut Vec<syn::Attribute>) -> syn::Result<Option<String>> {
    let mut name = None;
    let mut result = Ok(());
    attrs.retain(|attr| {
        if !attr.path().is_ident("web_method") {
            return true;
        }
        if matches!(attr.meta, syn::Meta::List(_)) {
            let parsed = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    name = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported web_method argument, expected `name`"))
                }
            });
            if let Err(err) = parsed {
                result = Err(err);
            }
        }
        false
    });
    result.map(|()| name)
}

/// Gets the correct crate name for importing jsonws.
///
/// - `::jsonws` (or its renamed form) when used as a dependency
/// - `crate` inside jsonws itself
pub(crate) fn get_crate_name() -> proc_macro2::TokenStream {
    match proc_macro_crate::crate_name("jsonws") {
        Ok(proc_macro_crate::FoundCrate::Name(name)) => {
            let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
            quote! { ::#ident }
        }
        _ => quote! { crate },
    }
}
