#[macro_use]
extern crate rocket;

pub mod error;
pub mod mail;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod staging;
pub mod storage;
pub mod validation;

use crate::mail::SmtpDispatcher;
use crate::request_logger::RequestLogger;
use crate::staging::StagingService;
use crate::storage::{ScyllaGateway, StorageConfig};
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket, Route};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Every API route plus the generated `/openapi.json`.
pub fn api_routes() -> Vec<Route> {
    openapi_get_routes![
        routes::health::health_check,
        routes::staging::post_message,
        routes::staging::send_messages,
        routes::staging::view_messages,
    ]
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(cors)
        // Connect to storage, bootstrap the schema and expose the repository
        .attach(AdHoc::try_on_ignite("Staging Storage", |rocket| async move {
            let config = match StorageConfig::from_env() {
                Ok(config) => config,
                Err(e) => {
                    log::error!("invalid storage configuration: {}", e);
                    return Err(rocket);
                }
            };

            match ScyllaGateway::connect(&config).await {
                Ok(gateway) => {
                    log::info!("storage ready (keyspace '{}')", config.keyspace);
                    let repository =
                        StagingService::new(Arc::new(gateway), Arc::new(SmtpDispatcher::new()))
                            .shared();
                    Ok(rocket.manage(repository))
                }
                Err(e) => {
                    log::error!("storage initialisation failed: {}", e);
                    Err(rocket)
                }
            }
        }))
        .mount("/", api_routes())
        .mount(
            "/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../openapi.json".to_owned(),
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::mail::{DispatchError, MailDispatch, MailError};
    use crate::models::EmailRecord;
    use crate::staging::{SharedRepository, StagingService};
    use parking_lot::Mutex;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use std::sync::Arc;

    mod memory_gateway;

    pub use memory_gateway::MemoryGateway;
    pub use scylla_container::{TestScylla, TestScyllaError};

    /// Mailer that records every record it is asked to send.
    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<EmailRecord>>,
        fail_after: Mutex<Option<usize>>,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Deliver `n` more messages, then fail every following one.
        pub fn fail_after(&self, n: usize) {
            *self.fail_after.lock() = Some(n);
        }

        pub fn sent(&self) -> Vec<EmailRecord> {
            self.sent.lock().clone()
        }
    }

    #[rocket::async_trait]
    impl MailDispatch for RecordingMailer {
        async fn dispatch(&self, batch: &[EmailRecord]) -> Result<usize, DispatchError> {
            let mut delivered = 0;
            for record in batch {
                {
                    let mut budget = self.fail_after.lock();
                    match *budget {
                        Some(0) => {
                            return Err(DispatchError::new(
                                delivered,
                                MailError::Config("injected failure".into()),
                            ));
                        }
                        Some(remaining) => *budget = Some(remaining - 1),
                        None => {}
                    }
                }
                self.sent.lock().push(record.clone());
                delivered += 1;
            }
            Ok(delivered)
        }
    }

    /// Repository over an in-memory gateway and a recording mailer.
    pub struct MemoryHarness {
        pub gateway: Arc<MemoryGateway>,
        pub mailer: Arc<RecordingMailer>,
        pub repository: SharedRepository,
    }

    impl MemoryHarness {
        pub fn new() -> Self {
            let gateway = Arc::new(MemoryGateway::new());
            let mailer = Arc::new(RecordingMailer::new());
            let repository = StagingService::new(gateway.clone(), mailer.clone()).shared();
            Self {
                gateway,
                mailer,
                repository,
            }
        }
    }

    impl Default for MemoryHarness {
        fn default() -> Self {
            Self::new()
        }
    }

    pub mod scylla_container {
        use std::time::Duration;

        use testcontainers::core::error::TestcontainersError;
        use testcontainers::core::{IntoContainerPort, WaitFor};
        use testcontainers::runners::AsyncRunner;
        use testcontainers::{ContainerAsync, GenericImage, ImageExt};
        use thiserror::Error;
        use uuid::Uuid;

        use crate::storage::{ScyllaGateway, StorageConfig, StorageError};

        const CQL_PORT: u16 = 9042;
        const CONNECT_ATTEMPTS: usize = 30;

        #[derive(Debug, Error)]
        pub enum TestScyllaError {
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
            #[error("storage error: {0}")]
            Storage(#[from] StorageError),
        }

        /// Disposable single-node ScyllaDB with a uniquely named keyspace.
        pub struct TestScylla {
            config: StorageConfig,
            _container: ContainerAsync<GenericImage>,
        }

        impl TestScylla {
            pub async fn start() -> Result<Self, TestScyllaError> {
                let container = GenericImage::new("scylladb/scylla", "6.2")
                    .with_exposed_port(CQL_PORT.tcp())
                    .with_wait_for(WaitFor::message_on_either_std(
                        "initialization completed",
                    ))
                    .with_cmd([
                        "--smp",
                        "1",
                        "--memory",
                        "512M",
                        "--overprovisioned",
                        "1",
                        "--developer-mode",
                        "1",
                    ])
                    .start()
                    .await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(CQL_PORT).await?;
                let keyspace = format!("stage_{}", Uuid::new_v4().simple());
                let config = StorageConfig::new(vec![format!("{host}:{port}")], keyspace)?;

                Ok(Self {
                    config,
                    _container: container,
                })
            }

            pub fn config(&self) -> &StorageConfig {
                &self.config
            }

            /// Connect a gateway, retrying while the CQL port finishes opening.
            pub async fn gateway(&self) -> Result<ScyllaGateway, TestScyllaError> {
                let mut attempt = 0;
                loop {
                    attempt += 1;
                    match ScyllaGateway::connect(&self.config).await {
                        Ok(gateway) => return Ok(gateway),
                        Err(err) if attempt < CONNECT_ATTEMPTS => {
                            log::debug!("scylla not ready (attempt {attempt}): {err}");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        repository: Option<SharedRepository>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                repository: None,
            }
        }

        /// Mount routes at the root, as the production server does.
        pub fn mount_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/".to_string(), routes));
            self
        }

        /// Manage the repository the staging handlers resolve from state.
        pub fn manage_repository(mut self, repository: SharedRepository) -> Self {
            self.repository = Some(repository);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(repository) = self.repository {
                rocket = rocket.manage(repository);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
