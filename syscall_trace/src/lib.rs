use proc_macro::TokenStream;
use quote::quote;
use syn::{FnArg, ItemFn, Pat, ReturnType, parse_macro_input};

/// Parameters that are plumbing rather than syscall arguments.
const UNTRACED: [&str; 2] = ["kernel", "tf"];

/// Log a syscall's arguments on entry and its result on exit, at `debug`.
///
/// The function must return a `Result` and its arguments must be `Debug`.
#[proc_macro_attribute]
pub fn syscall_trace(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut function = parse_macro_input!(item as ItemFn);
    let signature = &function.sig;
    let fn_name = &signature.ident;
    let ret_ty = match &signature.output {
        ReturnType::Type(_, ty) => ty.clone(),
        ReturnType::Default => {
            return syn::Error::new_spanned(signature, "a traced syscall must return a result")
                .to_compile_error()
                .into();
        }
    };

    let arg_names: Vec<_> = signature
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(pat_type) => match &*pat_type.pat {
                Pat::Ident(pat_ident) if !UNTRACED.iter().any(|s| pat_ident.ident == *s) => {
                    Some(pat_ident.ident.clone())
                }
                _ => None,
            },
            // `self` never appears in a syscall
            FnArg::Receiver(_) => None,
        })
        .collect();

    let arg_list_pattern = arg_names
        .iter()
        .map(|name| format!("{} = {{:?}}", name))
        .collect::<Vec<_>>()
        .join(", ");
    let format_pattern_in = format!("[syscall] <= {}({})", fn_name, arg_list_pattern);
    let format_pattern_out = format!("[syscall] => {} = {{:?}}", fn_name);

    let fn_body = &function.block;
    let block = quote! {{
        debug!(#format_pattern_in #(, #arg_names)*);

        let __result = (|| -> #ret_ty #fn_body)();

        debug!(#format_pattern_out, __result);
        __result
    }};
    function.block = match syn::parse2(block) {
        Ok(block) => block,
        Err(err) => return err.to_compile_error().into(),
    };
    quote! {
        #function
    }
    .into()
}
