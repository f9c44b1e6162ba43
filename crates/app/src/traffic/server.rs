//! Actix Web status server exposing the dashboard, MJPEG stream and signal state.
//!
//! The server runs on a dedicated thread with its own actix system so the
//! processing worker never shares a runtime with request handling. Handlers
//! only read published snapshots; none of them touch the video source.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use actix_web::{
    App, HttpResponse, HttpServer,
    http::header,
    web::{self, Bytes},
};
use anyhow::{Context, Result, anyhow};
use async_stream::stream;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::oneshot;
use tracing::error;

use crate::{
    html,
    traffic::data::{DetectionsResponse, FramePacket, SharedFrame, SharedSignal, TrafficStatus},
};

const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) latest: SharedFrame,
    pub(crate) signal: SharedSignal,
    /// Cleared when the pipeline stops; open video feeds end after their last frame.
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) metrics: Option<PrometheusHandle>,
}

/// Handle for the status server thread.
pub(crate) struct StatusServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl StatusServer {
    /// Signal the server to stop and block until the thread exits.
    pub(crate) fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Register every route on an actix app.
pub(crate) fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_route))
        .route("/video_feed", web::get().to(video_feed_handler))
        .route("/traffic_status", web::get().to(traffic_status_handler))
        .route("/detections", web::get().to(detections_handler))
        .route("/frame.jpg", web::get().to(frame_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Bind `addr`, start serving on a new thread and return once the socket is bound.
pub(crate) fn spawn_status_server(addr: SocketAddr, state: ServerState) -> Result<StatusServer> {
    let data = web::Data::new(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<std::result::Result<(), String>>(1);

    let handle = std::thread::Builder::new()
        .name("traffic-http".into())
        .spawn(move || {
            let result = actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new().app_data(data.clone()).configure(routes)
                })
                .bind(addr);
                let server = match server {
                    Ok(server) => server.run(),
                    Err(err) => {
                        let _ = ready_tx.send(Err(err.to_string()));
                        return Ok(());
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                server.await
            });
            if let Err(err) = result {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn status server thread")?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(StatusServer {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }),
        Ok(Err(err)) => {
            let _ = handle.join();
            Err(anyhow!("failed to bind {addr}: {err}"))
        }
        Err(_) => {
            let _ = handle.join();
            Err(anyhow!("status server thread exited before binding {addr}"))
        }
    }
}

fn latest_frame(shared: &SharedFrame) -> Option<Arc<FramePacket>> {
    shared.lock().ok().and_then(|guard| guard.clone())
}

fn current_status(state: &ServerState) -> Result<TrafficStatus> {
    if let Some(packet) = latest_frame(&state.latest) {
        return Ok(packet.status);
    }
    let signal = state
        .signal
        .lock()
        .map_err(|_| anyhow!("signal state poisoned"))?;
    Ok(TrafficStatus {
        traffic_light: signal.color(),
        vehicle_count: 0,
    })
}

fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let mut payload = Vec::with_capacity(jpeg.len() + 48);
    payload.extend_from_slice(b"--frame\r\n");
    payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    payload.extend_from_slice(jpeg);
    payload.extend_from_slice(b"\r\n");
    Bytes::from(payload)
}

async fn index_route() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html::INDEX_HTML)
}

/// Stream annotated frames as `multipart/x-mixed-replace`.
async fn video_feed_handler(state: web::Data<ServerState>) -> HttpResponse {
    let state = state.into_inner();
    let stream = stream! {
        let mut interval = actix_web::rt::time::interval(STREAM_POLL_INTERVAL);
        let mut last_sent: Option<u64> = None;
        loop {
            interval.tick().await;
            match latest_frame(&state.latest) {
                Some(packet) if last_sent != Some(packet.frame_number) => {
                    last_sent = Some(packet.frame_number);
                    yield Ok::<Bytes, actix_web::Error>(mjpeg_part(&packet.jpeg));
                }
                _ if !state.running.load(Ordering::Relaxed) => break,
                _ => {}
            }
        }
    };

    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        ))
        .streaming(stream)
}

async fn traffic_status_handler(state: web::Data<ServerState>) -> HttpResponse {
    match current_status(&state) {
        Ok(status) => HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, "no-cache"))
            .json(status),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

/// Vehicles found in the latest processed frame.
async fn detections_handler(state: web::Data<ServerState>) -> HttpResponse {
    match latest_frame(&state.latest) {
        Some(packet) => HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, "no-cache"))
            .json(DetectionsResponse {
                timestamp_ms: packet.timestamp_ms,
                frame_number: packet.frame_number,
                fps: packet.fps,
                vehicle_count: packet.status.vehicle_count,
                vehicles: &packet.vehicles,
            }),
        None => HttpResponse::NoContent().finish(),
    }
}

/// Latest annotated frame as a single JPEG.
async fn frame_handler(state: web::Data<ServerState>) -> HttpResponse {
    match latest_frame(&state.latest) {
        Some(packet) => HttpResponse::Ok()
            .content_type("image/jpeg")
            .insert_header(("X-Frame-Number", packet.frame_number.to_string()))
            .body(packet.jpeg.clone()),
        None => HttpResponse::NoContent().finish(),
    }
}

async fn metrics_handler(state: web::Data<ServerState>) -> HttpResponse {
    match state.metrics.as_ref() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NotFound().body("metrics recorder not installed"),
    }
}
