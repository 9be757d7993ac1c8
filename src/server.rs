use std::{net::ToSocketAddrs, pin::pin, time::Duration};

use hyper::{body::Incoming, service::Service};
use hyper_util::{
	rt::{TokioExecutor, TokioIo},
	server::{conn::auto::Builder as HyperServer, graceful::GracefulShutdown},
};
use restive_core::body::Body;
use tokio::net::TcpListener;

use crate::{
	common::BoxedError,
	request::Request,
	response::Response,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// A server that serves HTTP/1 and HTTP/2 connections until it receives Ctrl-C or,
/// on Unix, `SIGTERM`.
pub struct Server {
	hyper_server: HyperServer<TokioExecutor>,
	graceful_shutdown_watcher: GracefulShutdown,
	some_shutdown_duration: Option<Duration>,
}

impl Server {
	pub fn new() -> Self {
		Self {
			hyper_server: HyperServer::new(TokioExecutor::new()),
			graceful_shutdown_watcher: GracefulShutdown::new(),
			some_shutdown_duration: None,
		}
	}

	/// Sets how long the open connections are waited for after the shutdown signal.
	pub fn with_graceful_shutdown_duration(mut self, duration: Duration) -> Self {
		self.some_shutdown_duration = Some(duration);

		self
	}

	pub async fn serve<S, A>(self, service: S, bind_address: A) -> Result<(), BoxedError>
	where
		S: Service<Request<Incoming>, Response = Response<Body>> + Clone + Send + 'static,
		S::Future: Send + 'static,
		S::Error: Into<BoxedError>,
		A: ToSocketAddrs,
	{
		let Server {
			hyper_server,
			graceful_shutdown_watcher,
			some_shutdown_duration,
		} = self;

		let mut addresses = bind_address.to_socket_addrs()?;
		let listener = loop {
			let Some(address) = addresses.next() else {
				return Err(ServeError.into());
			};

			match TcpListener::bind(address).await {
				Ok(listener) => {
					tracing::info!("listening on {}", address);

					break listener;
				}
				Err(error) => tracing::warn!("couldn't bind {}: {}", address, error),
			}
		};

		let mut accept_error_count = 0;
		let mut pinned_ctrl_c = pin!(tokio::signal::ctrl_c());

		#[cfg(unix)]
		let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

		#[cfg(unix)]
		let mut pinned_terminate = pin!(signal.recv());

		#[cfg(not(unix))]
		let mut pinned_terminate = pin!(std::future::pending::<()>());

		loop {
			tokio::select! {
				connection = listener.accept() => {
					let (stream, peer_address) = match connection {
						Ok(connection) => connection,
						Err(error) => {
							tracing::warn!("accept failure: {}", error);
							tokio::time::sleep(Duration::from_secs(1)).await;

							if accept_error_count < 3 {
								accept_error_count += 1;

								continue;
							}

							return Err(error.into());
						}
					};

					accept_error_count = 0;

					let connection = hyper_server.serve_connection(TokioIo::new(stream), service.clone());
					let connection = graceful_shutdown_watcher.watch(connection.into_owned());

					tokio::spawn(async move {
						if let Err(error) = connection.await {
							tracing::debug!("connection with {} failed: {}", peer_address, error);
						}
					});
				},
				_ = pinned_ctrl_c.as_mut() => break,
				_ = pinned_terminate.as_mut() => break,
			}
		}

		tracing::info!("shutting down");

		if let Some(duration) = some_shutdown_duration {
			tokio::select! {
				_ = graceful_shutdown_watcher.shutdown() => {},
				_ = tokio::time::sleep(duration) => {
					tracing::warn!("graceful shutdown timed out");
				},
			}
		}

		Ok(())
	}
}

impl Default for Server {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Debug, crate::ImplError)]
#[error("no valid address to bind")]
struct ServeError;
