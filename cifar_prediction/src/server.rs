use crate::{
    config::Config, connection::ShutdownAwareStream, inference_service::InferenceService,
    model_service::ModelService, ort_service::OrtModelService,
};
use cifar_proto::classification_server::ClassificationServer;
use futures::StreamExt;
use std::{future::Future, net::SocketAddr};
use tokio::{net::TcpListener, signal, sync::broadcast};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Router;
use tonic::transport::Server;

pub struct GrpcServer {
    router: Router,
    addr: String,
}

impl GrpcServer {
    pub async fn new<M: ModelService>(
        model_service: M,
        max_workers: usize,
        addr: &str,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let inference_service = InferenceService::new(model_service, max_workers);

        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_serving::<ClassificationServer<InferenceService<M>>>()
            .await;

        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(cifar_proto::FILE_DESCRIPTOR_SET)
            .build_v1alpha()?;

        let router = Server::builder()
            .add_service(health_service)
            .add_service(reflection_service)
            .add_service(ClassificationServer::new(inference_service));

        Ok(Self {
            router,
            addr: addr.to_string(),
        })
    }

    /// Serves until Ctrl+C or SIGTERM. In-flight calls are dropped, not drained.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = self.addr.parse()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Classification service listening on {}", addr);

        self.serve_with_listener(listener, shutdown_signal()).await
    }

    /// Serves on an already bound listener until `shutdown` completes, then
    /// closes the listener and every open connection.
    pub async fn serve_with_listener(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Every accepted connection watches this channel; dropping the sender
        // on return aborts them all.
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let connection_tx = shutdown_tx.clone();
        let incoming = TcpListenerStream::new(listener).map(move |conn| {
            conn.map(|stream| ShutdownAwareStream::new(stream, connection_tx.subscribe()))
        });

        tokio::select! {
            result = self.router.serve_with_incoming(incoming) => result?,
            _ = shutdown => {
                tracing::info!("Shutdown signal received, closing all connections");
            }
        }

        let _ = shutdown_tx.send(());
        Ok(())
    }
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ort_model_service = match OrtModelService::new(&config.model) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to instantiate ort model service: {}", e);
            return Err(e);
        }
    };

    let addr = config.server.get_address();
    tracing::info!(
        "Starting with {} worker(s) and {} model instance(s)",
        config.server.max_workers,
        config.model.num_instances
    );

    let grpc_server = GrpcServer::new(ort_model_service, config.server.max_workers, &addr).await?;
    grpc_server.run().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
