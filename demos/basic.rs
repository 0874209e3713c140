//! Basic example of the Rabt DI container.
//!
//! Run with `RUST_LOG=rabt_container=debug` to watch registrations and disposal.

use rabt::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Database {
    url: Arc<String>,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

impl Injectable for Database {
    fn dependencies() -> Vec<Key> {
        vec![Key::from("database_url"), Key::marker::<dyn Logger>()]
    }

    fn construct(call: &Call<'_>) -> Result<Self> {
        Ok(Database {
            url: call.get::<String>(0)?,
            logger: call.get::<dyn Logger>(1)?,
        })
    }
}

/// One per request container.
struct Session {
    id: usize,
    closed: Arc<AtomicUsize>,
}

impl Dispose for Session {
    fn dispose(&self) -> Result<()> {
        println!("Closing session {}", self.id);
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct UserService {
    db: Arc<Database>,
    session: Arc<Session>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        let rows = self.db.query(&format!("SELECT * FROM users WHERE id = {id}"));
        format!("{rows} (session {})", self.session.id)
    }
}

impl Injectable for UserService {
    fn dependencies() -> Vec<Key> {
        vec![Key::of::<Database>(), Key::from("session")]
    }

    fn construct(call: &Call<'_>) -> Result<Self> {
        Ok(UserService {
            db: call.get::<Database>(0)?,
            session: call.get::<Session>(1)?,
        })
    }
}

// === Group registrations into a provider ===

struct InfrastructureProvider {
    closed: Arc<AtomicUsize>,
}

impl Provider for InfrastructureProvider {
    fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
        let url = Value::new("postgres://localhost/myapp".to_string());
        registry.add_binding(bind(["database_url"])?.to_value(url));

        registry.add_binding(
            bind([Key::marker::<dyn Logger>()])?
                .to(|_| {
                    let logger = Instance::new(ConsoleLogger).implements::<dyn Logger>(|l| l);
                    Ok(Some(logger.into()))
                })
                .once(),
        );

        registry.add_binding(bind([Key::of::<Database>()])?.once());

        let sessions = Arc::new(AtomicUsize::new(0));
        let closed = self.closed.clone();
        registry.add_binding(bind(["session"])?.to(move |_| {
            let id = sessions.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(Value::disposable(Session {
                id,
                closed: closed.clone(),
            })))
        }));

        Ok(())
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rabt_container=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let closed = Arc::new(AtomicUsize::new(0));

    // Build the root container
    let app = Container::builder()
        .add_provider(&InfrastructureProvider {
            closed: closed.clone(),
        })
        .build()?;

    println!("Container built: {app:?}");

    // === A child container per request ===
    for request in [42, 7] {
        let request_container = app.child([])?;

        let service = request_container.get::<UserService>(Key::of::<UserService>())?;
        println!("{}", service.get_user(request));

        // Same container: the session is reused
        let again = request_container.get::<UserService>(Key::of::<UserService>())?;
        assert!(Arc::ptr_eq(&service.session, &again.session));

        request_container.dispose()?;
    }

    // === Factories and optional dependencies ===
    let make_service = app.resolve(make_factory(Key::of::<UserService>(), vec![]))?;
    if let Some(make_service) = make_service.as_function() {
        let service = make_service.call(vec![])?;
        if let Some(service) = service.get::<UserService>() {
            println!("{}", service.get_user(1));
        }
    }

    let theme = app.resolve(optional("theme", Some(Value::new("dark".to_string()))))?;
    println!("Theme: {}", theme.get::<String>().map_or("none".into(), |t| t.to_string()));

    app.dispose()?;
    println!("Sessions closed: {}", closed.load(Ordering::SeqCst));
    Ok(())
}
