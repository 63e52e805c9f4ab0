use hyper::StatusCode;
use resthook::{Config, Error, HandlerResult, Request, Resource, ResponseWriter, Router};
use serde::{Deserialize, Serialize};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = Config::load_from(&config_path)?;
    resthook::logger::init(&cfg)?;

    // Worker threads follow the config, defaulting to one per CPU core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("RESTHOOK_API_KEY").ok();

    let mut router = Router::with_config(&cfg);
    if let Some(key) = api_key {
        router.add_hook(move |_, r| match r.header("x-api-key") {
            Some(given) if given == key => Ok(()),
            _ => Err(Error::unauthorized("missing or invalid x-api-key")),
        });
    }

    let _ = router.get("/hello", hello);
    let _ = router
        .get("/users/{id}", get_user)
        .before(require_numeric_id)
        .on_error(|_, r| {
            resthook::logger::log_warning(&format!("User lookup failed for {}", r.path()));
            Ok(())
        });
    let _ = router.post("/upload", upload);
    router.register(Users);

    resthook::listen_and_serve(&cfg, router.build()?).await?;
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

fn hello(w: &mut ResponseWriter, r: &mut Request) -> HandlerResult {
    let name = r.query_param("name").unwrap_or_else(|| "world".to_string());
    w.write_single_string_json("hello", &name)?;
    Ok(())
}

fn require_numeric_id(_w: &mut ResponseWriter, r: &mut Request) -> HandlerResult {
    match r.url_param("id").map(str::parse::<u64>) {
        Some(Ok(_)) => Ok(()),
        _ => Err(Error::bad_request("id must be a number")),
    }
}

fn get_user(w: &mut ResponseWriter, r: &mut Request) -> HandlerResult {
    let id: u64 = r
        .url_param("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| Error::bad_request("id must be a number"))?;
    if id == 0 {
        return Err(Error::not_found("no such user").with_app_status(1));
    }
    w.write_json(&User {
        id,
        name: format!("user-{id}"),
    })?;
    Ok(())
}

fn upload(w: &mut ResponseWriter, r: &mut Request) -> HandlerResult {
    let mut sizes = Vec::new();
    r.for_each_file_reader("file", |_, reader| -> HandlerResult {
        let copied = std::io::copy(reader, &mut std::io::sink())
            .map_err(|e| Error::from_error(&e, 0, StatusCode::INTERNAL_SERVER_ERROR))?;
        sizes.push(copied);
        Ok(())
    })?;
    w.set_status(StatusCode::CREATED)?;
    w.write_json(&sizes)?;
    Ok(())
}

/// Echo resource mounted at `/users`
struct Users;

impl Resource for Users {
    fn root_url(&self) -> &str {
        "users"
    }

    fn get(&self, w: &mut ResponseWriter, _r: &mut Request) -> HandlerResult {
        w.write_json(&[User {
            id: 1,
            name: "user-1".to_string(),
        }])?;
        Ok(())
    }

    fn post(&self, w: &mut ResponseWriter, r: &mut Request) -> HandlerResult {
        let user: User = r.json()?;
        w.set_status(StatusCode::CREATED)?;
        w.write_json(&user)?;
        Ok(())
    }
}
