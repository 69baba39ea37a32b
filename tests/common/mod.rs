//! Local stand-in for the httpbin form and echo endpoint.

#![allow(dead_code)]

use axum::http::Uri;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use formcheck::FormBody;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const PIZZA_FORM: &str = r#"<!DOCTYPE html>
<html>
<head><title>Order</title></head>
<body>
<form method="post" action="/post">
  <p><label>Customer name: <input name="custname"></label></p>
  <p><label>Telephone: <input type="tel" name="custtel"></label></p>
  <p><label>E-mail address: <input type="email" name="custemail"></label></p>
  <fieldset>
    <legend>Pizza Size</legend>
    <label><input type="radio" name="size" value="small"> Small</label>
    <label><input type="radio" name="size" value="medium"> Medium</label>
    <label><input type="radio" name="size" value="large"> Large</label>
  </fieldset>
  <fieldset>
    <legend>Pizza Toppings</legend>
    <label><input type="checkbox" name="topping" value="bacon"> Bacon</label>
    <label><input type="checkbox" name="topping" value="cheese"> Extra Cheese</label>
    <label><input type="checkbox" name="topping" value="onion"> Onion</label>
    <label><input type="checkbox" name="topping" value="mushroom"> Mushroom</label>
  </fieldset>
  <fieldset>
    <legend>Delivery</legend>
    <label><input type="radio" name="delivery" value="now"> Now</label>
    <label><input type="radio" name="delivery" value="later"> Later</label>
  </fieldset>
  <p><label>Delivery instructions: <textarea name="comments"></textarea></label></p>
  <p><button type="submit">Submit order</button></p>
</form>
</body>
</html>"#;

/// Echo server bound to an ephemeral port.
pub struct EchoServer {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl EchoServer {
    pub async fn start() -> std::io::Result<Self> {
        let app = Router::new()
            .route("/forms/post", get(|| async { Html(PIZZA_FORM) }))
            .route("/post", post(echo));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .ok();
        });

        Ok(Self {
            base_url,
            shutdown: Some(tx),
        })
    }

    pub fn form_url(&self) -> String {
        format!("{}/forms/post", self.base_url)
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// httpbin-style echo: one value stays a string, repeated keys become an array.
async fn echo(uri: Uri, body: String) -> Json<serde_json::Value> {
    let form = FormBody::parse(&body).to_echoed();
    Json(serde_json::json!({
        "args": {},
        "data": "",
        "form": form,
        "url": format!("http://localhost{}", uri.path()),
    }))
}

/// Check if Chrome is available
pub fn chrome_available() -> bool {
    eoka::stealth::patcher::find_chrome().is_ok()
}
