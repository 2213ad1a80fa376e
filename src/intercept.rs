//! FetchShim: observes comment API responses without touching them
//!
//! `window.fetch` is replaced by a wrapper that calls the original and hands
//! the caller the original promise untouched. A `then` registered on that
//! promise (before the caller can register its own) clones matching responses
//! synchronously; the body is read and the pipeline run on a spawned task.
//! Nothing that goes wrong there reaches the caller.

use std::rc::Rc;

use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Response, Window};

use crate::dom::{js_error_message, WebPage};
use crate::reconcile::{CycleOutcome, Pipeline};

/// Whether a response URL is the comment API endpoint. Exact match only.
pub fn is_comment_api(url: &str, api_url: &str) -> bool {
    url == api_url
}

/// Wrap `window.fetch`. Must only be called once per window.
pub fn install_fetch_shim(window: &Window, pipeline: Rc<Pipeline<WebPage>>) -> Result<(), JsValue> {
    let original: Function = Reflect::get(window, &JsValue::from_str("fetch"))?.dyn_into()?;
    let receiver: JsValue = window.clone().into();

    let on_response = Closure::wrap(Box::new(move |value: JsValue| {
        if let Some(copy) = claim_response(&value, &pipeline.config().api_url) {
            let pipeline = Rc::clone(&pipeline);
            spawn_local(async move { run_cycle(copy, pipeline).await });
        }
    }) as Box<dyn FnMut(JsValue)>);

    // Keeps our branch of the promise from reporting the caller's rejections
    let on_rejected = Closure::wrap(Box::new(|_: JsValue| {}) as Box<dyn FnMut(JsValue)>);

    let shim = Closure::wrap(Box::new(move |input: JsValue, init: JsValue| -> Result<JsValue, JsValue> {
        let pending = original.call2(&receiver, &input, &init)?;
        if let Some(promise) = pending.dyn_ref::<Promise>() {
            let _ = promise.then2(&on_response, &on_rejected);
        }
        Ok(pending)
    }) as Box<dyn FnMut(JsValue, JsValue) -> Result<JsValue, JsValue>>);

    Reflect::set(window, &JsValue::from_str("fetch"), shim.as_ref())?;
    shim.forget();
    Ok(())
}

/// Clone the response if it belongs to the comment API
fn claim_response(value: &JsValue, api_url: &str) -> Option<Response> {
    let response = value.dyn_ref::<Response>()?;
    if !is_comment_api(&response.url(), api_url) {
        return None;
    }
    match response.clone() {
        Ok(copy) => Some(copy),
        Err(e) => {
            web_sys::console::error_1(
                &format!("[FetchShim] Failed to clone response: {}", js_error_message(&e)).into(),
            );
            None
        }
    }
}

async fn read_body(response: &Response) -> Result<String, String> {
    let text = response
        .text()
        .map_err(|e| format!("Failed to read response body: {}", js_error_message(&e)))?;
    JsFuture::from(text)
        .await
        .map_err(|e| format!("Failed to read response body: {}", js_error_message(&e)))?
        .as_string()
        .ok_or_else(|| "Response body is not text".to_string())
}

async fn run_cycle(response: Response, pipeline: Rc<Pipeline<WebPage>>) {
    let outcome = match read_body(&response).await {
        Ok(body) => pipeline.handle_body(&body).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(CycleOutcome::Reconciled(report)) => {
            if !report.malformed_settings.is_empty() {
                web_sys::console::warn_1(
                    &format!(
                        "[Pipeline] Ignored malformed settings: {}",
                        report.malformed_settings.join(", ")
                    )
                    .into(),
                );
            }
            web_sys::console::debug_1(
                &format!(
                    "[Pipeline] cycle {}: {} comments (shared NG {}), {}/{} rows written in {:.1}ms",
                    report.generation,
                    report.corpus_len,
                    report.share_threshold,
                    report.initial.written,
                    report.initial.visited,
                    report.elapsed_ms
                )
                .into(),
            );
        }
        Ok(CycleOutcome::Superseded { generation }) => {
            web_sys::console::debug_1(&format!("[Pipeline] cycle {} superseded", generation).into());
        }
        Err(e) => {
            web_sys::console::error_1(&format!("[FetchShim] {}", e).into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_API_URL;

    #[test]
    fn test_matches_exact_endpoint_only() {
        assert!(is_comment_api(DEFAULT_API_URL, DEFAULT_API_URL));
        assert!(!is_comment_api("https://public.nvcomment.nicovideo.jp/v1/threads?x=1", DEFAULT_API_URL));
        assert!(!is_comment_api("https://nvapi.nicovideo.jp/v1/users/me", DEFAULT_API_URL));
        assert!(!is_comment_api("", DEFAULT_API_URL));
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use crate::config::{FixConfig, DEFAULT_API_URL};
    use gloo_timers::future::TimeoutFuture;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn window() -> Window {
        web_sys::window().unwrap()
    }

    /// Replace `window.fetch` with one resolving to a fixed response; returns
    /// that response and the fetch that was there before
    fn stub_fetch(body: &str) -> (JsValue, JsValue) {
        let window = window();
        let previous = Reflect::get(&window, &JsValue::from_str("fetch")).unwrap();
        let response: JsValue = Response::new_with_opt_str(Some(body)).unwrap().into();

        let served = response.clone();
        let stub = Closure::wrap(Box::new(move |_: JsValue, _: JsValue| -> JsValue {
            Promise::resolve(&served).into()
        }) as Box<dyn FnMut(JsValue, JsValue) -> JsValue>);
        Reflect::set(&window, &JsValue::from_str("fetch"), stub.as_ref()).unwrap();
        stub.forget();

        (response, previous)
    }

    fn restore_fetch(previous: &JsValue) {
        Reflect::set(&window(), &JsValue::from_str("fetch"), previous).unwrap();
    }

    /// Pipeline whose endpoint matches (or not) the stub's empty response URL
    fn pipeline(matching: bool) -> Rc<Pipeline<WebPage>> {
        let mut config = FixConfig::default();
        config.retry = config.retry.with_max_attempts(1);
        config.retry.interval_ms = 1;
        config.retry.max_interval_ms = 1;
        if matching {
            config.api_url = String::new();
        }
        let page = WebPage::new(&window(), &config).unwrap();
        Rc::new(Pipeline::new(page, config))
    }

    async fn call_fetch() -> JsValue {
        let window = window();
        let fetch: Function = Reflect::get(&window, &JsValue::from_str("fetch"))
            .unwrap()
            .dyn_into()
            .unwrap();
        let pending: Promise = fetch
            .call1(&window, &JsValue::from_str(DEFAULT_API_URL))
            .unwrap()
            .dyn_into()
            .unwrap();
        JsFuture::from(pending).await.unwrap()
    }

    async fn body_of(response: JsValue) -> String {
        let response: Response = response.dyn_into().unwrap();
        JsFuture::from(response.text().unwrap()).await.unwrap().as_string().unwrap()
    }

    #[wasm_bindgen_test]
    async fn test_caller_gets_same_response_with_unread_body() {
        let body = r#"{ "data": { "threads": [] } }"#;
        let (served, previous) = stub_fetch(body);
        let pipeline = pipeline(true);
        install_fetch_shim(&window(), Rc::clone(&pipeline)).unwrap();

        let received = call_fetch().await;
        assert!(js_sys::Object::is(&received, &served));
        assert_eq!(body_of(received).await, body);

        // The clone was decoded and started a cycle of its own
        TimeoutFuture::new(50).await;
        assert_eq!(pipeline.generation(), 1);

        restore_fetch(&previous);
    }

    #[wasm_bindgen_test]
    async fn test_undecodable_body_does_not_reach_caller() {
        let (served, previous) = stub_fetch("<html>not json</html>");
        let pipeline = pipeline(true);
        install_fetch_shim(&window(), Rc::clone(&pipeline)).unwrap();

        let received = call_fetch().await;
        assert!(js_sys::Object::is(&received, &served));
        assert_eq!(body_of(received).await, "<html>not json</html>");

        TimeoutFuture::new(50).await;
        assert_eq!(pipeline.generation(), 0);

        restore_fetch(&previous);
    }

    #[wasm_bindgen_test]
    async fn test_other_urls_are_left_alone() {
        let body = r#"{ "data": { "threads": [] } }"#;
        let (served, previous) = stub_fetch(body);
        let pipeline = pipeline(false);
        install_fetch_shim(&window(), Rc::clone(&pipeline)).unwrap();

        let received = call_fetch().await;
        assert!(js_sys::Object::is(&received, &served));
        assert_eq!(body_of(received).await, body);

        TimeoutFuture::new(50).await;
        assert_eq!(pipeline.generation(), 0);

        restore_fetch(&previous);
    }
}
