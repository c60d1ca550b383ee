use axum::{Router, response::Html, routing::get};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use webauthn_passkey_axum::WEBAUTHN_ROUTE_PREFIX;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    webauthn_passkey_axum::init().await?;

    let app = Router::new()
        .route("/", get(index))
        .nest(WEBAUTHN_ROUTE_PREFIX.as_str(), webauthn_passkey_axum::router());

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3001".to_string());
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Passkey demo</title></head>
<body>
<h1>Passkey demo</h1>
<p>
  <input id="username" placeholder="username" value="alice">
  <button onclick="register()">Register passkey</button>
  <button onclick="authenticate()">Sign in</button>
</p>
<pre id="log"></pre>
<script>
const log = (msg) => document.getElementById('log').textContent += msg + '\n';
const b64uToBuf = (s) =>
  Uint8Array.from(atob(s.replace(/-/g, '+').replace(/_/g, '/')), c => c.charCodeAt(0));
const bufToB64u = (buf) =>
  btoa(String.fromCharCode(...new Uint8Array(buf)))
    .replace(/\+/g, '-').replace(/\//g, '_').replace(/=+$/, '');

async function register() {
  const username = document.getElementById('username').value;
  const begin = await fetch('/webauthn/register/begin', {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify({user_id: username, username, displayname: username}),
  });
  if (!begin.ok) return log('register begin failed: ' + begin.status);
  const options = await begin.json();
  options.challenge = b64uToBuf(options.challenge);
  options.user.id = b64uToBuf(options.user.id);
  (options.excludeCredentials || []).forEach(c => c.id = b64uToBuf(c.id));

  const credential = await navigator.credentials.create({publicKey: options});
  const complete = await fetch('/webauthn/register/complete', {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify({
      id: credential.id,
      rawId: bufToB64u(credential.rawId),
      type: credential.type,
      response: {
        clientDataJSON: bufToB64u(credential.response.clientDataJSON),
        attestationObject: bufToB64u(credential.response.attestationObject),
      },
      transports: credential.response.getTransports ? credential.response.getTransports() : [],
    }),
  });
  log('register complete: ' + complete.status);
}

async function authenticate() {
  const username = document.getElementById('username').value;
  const begin = await fetch('/webauthn/authenticate/begin', {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify({username}),
  });
  if (!begin.ok) return log('authenticate begin failed: ' + begin.status);
  const options = await begin.json();
  options.challenge = b64uToBuf(options.challenge);
  (options.allowCredentials || []).forEach(c => c.id = b64uToBuf(c.id));

  const assertion = await navigator.credentials.get({publicKey: options});
  const complete = await fetch('/webauthn/authenticate/complete', {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify({
      id: assertion.id,
      rawId: bufToB64u(assertion.rawId),
      type: assertion.type,
      response: {
        clientDataJSON: bufToB64u(assertion.response.clientDataJSON),
        authenticatorData: bufToB64u(assertion.response.authenticatorData),
        signature: bufToB64u(assertion.response.signature),
        userHandle: assertion.response.userHandle ? bufToB64u(assertion.response.userHandle) : null,
      },
    }),
  });
  log('authenticate complete: ' + complete.status);
}
</script>
</body>
</html>
"#;
