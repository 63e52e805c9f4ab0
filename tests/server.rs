use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::StatusCode;
use resthook::http::client;
use resthook::{Config, Error, Router, Server};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Greeting {
    name: String,
}

async fn start(router: Router, config: &Config) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = router.build().unwrap();
    let server = Server::bind("127.0.0.1:0".parse().unwrap(), &config.performance).unwrap();
    let addr = server.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        server
            .serve_with_shutdown(app, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (addr, tx, handle)
}

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.logging.access_log = false;
    config.performance.read_timeout = 2;
    config.performance.write_timeout = 2;
    config
}

#[tokio::test]
async fn test_serves_over_tcp() {
    let config = quiet_config();
    let after_calls = Arc::new(AtomicUsize::new(0));

    let mut router = Router::with_config(&config);
    let calls = Arc::clone(&after_calls);
    let _ = router
        .post("/greet", |w, r| {
            let greeting: Greeting = r.json()?;
            w.write_json(&greeting)?;
            Ok(())
        })
        .after(move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    let _ = router.post("/form", |w, r| {
        let name = String::from_utf8_lossy(r.body()).into_owned();
        w.write(name.as_bytes())?;
        Ok(())
    });
    let _ = router
        .get("/admin", |_, _| Ok(()))
        .before(|_, _| Err(Error::forbidden("admins only").with_app_status(9)));

    let (addr, shutdown, handle) = start(router, &config).await;
    let base = format!("http://{addr}");

    let greeting = Greeting { name: "ada".to_string() };
    let response = client::post_json(&format!("{base}/greet"), &greeting).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Greeting>().unwrap(), greeting);
    assert!(response.error().is_none());
    assert_eq!(after_calls.load(Ordering::SeqCst), 1);

    let response = client::post_form(&format!("{base}/form"), &[("name", "grace hopper")]).await.unwrap();
    assert_eq!(response.text(), "name=grace+hopper");

    let response = client::get(&format!("{base}/admin")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let err = response.error().unwrap();
    assert_eq!(err.message, "admins only");
    assert_eq!(err.app_status, Some(9));

    let response = client::get(&format!("{base}/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.error().unwrap().status, StatusCode::NOT_FOUND);

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_bind_rejects_used_port() {
    let config = quiet_config();
    let first = Server::bind("127.0.0.1:0".parse().unwrap(), &config.performance).unwrap();
    let addr = first.local_addr().unwrap();
    assert!(Server::bind(addr, &config.performance).is_err());
}

#[tokio::test]
async fn test_shutdown_closes_idle_keep_alive_connections() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut config = Config::default();
    config.logging.access_log = false;
    config.performance.read_timeout = 30;
    config.performance.write_timeout = 30;

    let mut router = Router::with_config(&config);
    let _ = router.get("/ping", |w, _| {
        w.write(b"pong")?;
        Ok(())
    });
    let (addr, shutdown, handle) = start(router, &config).await;

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut received = Vec::new();
    let mut buf = vec![0u8; 1024];
    while !received.ends_with(b"pong") {
        let n = stream.read(&mut buf).await.unwrap();
        assert_ne!(n, 0, "connection closed before the response arrived");
        received.extend_from_slice(&buf[..n]);
    }
    assert!(received.starts_with(b"HTTP/1.1 200"));

    shutdown.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("server kept waiting on an idle connection")
        .unwrap();

    let n = stream.read(&mut buf).await.unwrap_or(0);
    assert_eq!(n, 0);
}
