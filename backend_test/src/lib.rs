use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject dependencies.
///
/// Every test gets a server of its own. By default it runs over a fresh
/// in-memory ledger. A test that asks for a [`mongodb::Database`] runs over a
/// MongoDB ledger in a freshly named database instead, which is dropped
/// however the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`], which
/// talks to that server, [`crate::ledger::SharedLedger`], the ledger itself,
/// and [`mongodb::Database`].
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    if !args.is_empty() {
        let args = TokenStream2::from(args);
        return syn::Error::new(args.span(), "`backend_test` takes no arguments")
            .into_compile_error()
            .into();
    }

    // Extract type information and reject invalid function signatures.
    let (test_args, has_db) = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let logging = quote! {
        log4rs_test_utils::test_logging::init_logging_once_for(["evoting_backend"], None, None);
    };

    // Rewrite the test function.
    if has_db {
        quote! {
            #[test]
            fn #name() {
                /// Test setup.
                async fn setup() -> (rocket::local::asynchronous::Client, crate::ledger::SharedLedger, mongodb::Database) {
                    let db = crate::test_database().await;
                    let ledger: crate::ledger::SharedLedger = std::sync::Arc::new(
                        crate::ledger::MongoLedger::from_db(&db).await.unwrap(),
                    );
                    let rocket_client = rocket::local::asynchronous::Client::tracked(crate::rocket_for_ledger(ledger.clone()))
                        .await
                        .unwrap();
                    (rocket_client, ledger, db)
                }

                /// The test itself.
                #item_fn

                /// Test cleanup.
                async fn cleanup(db: mongodb::Database) {
                    db.drop(None).await.unwrap();
                }

                #logging

                // Create an async runtime. We need a separate one for inside and
                // outside the `catch_unwind`.
                let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                    .thread_name("test-setup-cleanup")
                    .worker_threads(1)
                    .enable_all()
                    .build()
                    .unwrap();
                let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                    .thread_name("rocket-worker-test-thread")
                    .worker_threads(1)
                    .enable_all()
                    .build()
                    .unwrap();

                // Run the setup.
                let (rocket_client, ledger, db) = outer_runtime.block_on(setup());

                // Run the test, catching any panics.
                // Use mutexes to safely transfer `!UnwindSafe` data.
                let client_mutex = std::sync::Mutex::new(rocket_client);
                let ledger_mutex = std::sync::Mutex::new(ledger);
                let db_mutex = std::sync::Mutex::new(db.clone());
                let runtime_mutex = std::sync::Mutex::new(inner_runtime);
                let result = std::panic::catch_unwind(|| {
                    #[allow(unused_variables)]
                    let rocket_client = client_mutex.into_inner().unwrap();
                    #[allow(unused_variables)]
                    let ledger = ledger_mutex.into_inner().unwrap();
                    #[allow(unused_variables)]
                    let db = db_mutex.into_inner().unwrap();
                    let runtime = runtime_mutex.into_inner().unwrap();

                    runtime.block_on(#new_name(#(#test_args),*));
                });

                // Run the cleanup.
                outer_runtime.block_on(cleanup(db));

                // If the test panicked, re-raise the panic.
                if let Err(cause) = result {
                    std::panic::panic_any(cause);
                }
            }
        }
        .into()
    } else {
        quote! {
            #[test]
            fn #name() {
                /// Test setup.
                async fn setup() -> (rocket::local::asynchronous::Client, crate::ledger::SharedLedger) {
                    let ledger: crate::ledger::SharedLedger =
                        std::sync::Arc::new(crate::ledger::MemoryLedger::new());
                    let rocket_client = rocket::local::asynchronous::Client::tracked(crate::rocket_for_ledger(ledger.clone()))
                        .await
                        .unwrap();
                    (rocket_client, ledger)
                }

                /// The test itself.
                #item_fn

                #logging

                let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                    .thread_name("rocket-worker-test-thread")
                    .worker_threads(1)
                    .enable_all()
                    .build()
                    .unwrap();

                runtime.block_on(async {
                    #[allow(unused_variables)]
                    let (rocket_client, ledger) = setup().await;
                    #new_name(#(#test_args),*).await;
                });
            }
        }
        .into()
    }
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
/// Also reports whether the test asked for a database.
fn check_sig(sig: Signature) -> Result<(Vec<TokenStream2>, bool), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_ledger = false;
    let mut has_db = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself
                if let Some(segment) = type_path.path.segments.last() {
                    if segment.ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if segment.ident == "SharedLedger" {
                        if has_ledger {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `SharedLedger`",
                            ));
                        }
                        has_ledger = true;
                        args.push(quote! { ledger });
                        continue;
                    } else if segment.ident == "Database" {
                        if has_db {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `mongodb::Database`",
                            ));
                        }
                        has_db = true;
                        args.push(quote! { db });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `ledger_ident: SharedLedger` or `db_ident: Database`",
        ));
    }

    Ok((args, has_db))
}
