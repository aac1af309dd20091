//! # API Server
//!
//! Exposes the supervisor's REST surface (spec §4.6, §6.2): kick off a job,
//! poll its envelope, and pause/resume/cancel it. Shaped the same way as
//! `klipper-host::api`'s `AppState` + `#[get]`/`#[post]` handlers, with the
//! shared printer mutex swapped for the single-active-job slot this service
//! guards (spec §4.6 "At most one active job at a time").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use actix_web::middleware::DefaultHeaders;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use parking_lot::Mutex;
use polargraph_proto::{ErrorResponse, SendPathRequest, VisualizeRequest};
use tracing::info;

use crate::batch::split_into_batches;
use crate::client::DeviceClient;
use crate::job::JobState;
use crate::runner::{self, JobInput};

#[derive(Clone)]
pub struct AppState {
    pub job: Arc<Mutex<Option<JobState>>>,
    pub device: DeviceClient,
    pub next_job_id: Arc<AtomicU64>,
    pub batch_size: usize,
}

impl AppState {
    /// Rejects a new submission while a prior job is still active (spec
    /// §4.6 "submitting a new one while pending or running is rejected with
    /// 409").
    fn start_job(&self, req: SendPathRequest) -> Result<(), &'static str> {
        {
            let guard = self.job.lock();
            if let Some(job) = guard.as_ref() {
                if job.is_active() {
                    return Err("a job is already pending or running");
                }
            }
        }

        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        let batches = split_into_batches(&req.points, self.batch_size);
        let new_job = JobState::new(job_id, req.points, batches.len());
        *self.job.lock() = Some(new_job);

        let device = self.device.clone();
        let slot = self.job.clone();
        let input = JobInput {
            job_id,
            batches,
            start_position: req.start_position,
            speed: req.speed,
        };
        tokio::spawn(runner::run_job(slot, device, input));
        Ok(())
    }
}

#[post("/api/send-path")]
async fn send_path(body: web::Json<SendPathRequest>, data: web::Data<AppState>) -> impl Responder {
    match data.start_job(body.into_inner()) {
        Ok(()) => {
            let guard = data.job.lock();
            HttpResponse::Ok().json(guard.as_ref().map(JobState::to_envelope))
        }
        Err(msg) => HttpResponse::Conflict().json(ErrorResponse::new(msg)),
    }
}

#[get("/api/send-path/status")]
async fn send_path_status(data: web::Data<AppState>) -> impl Responder {
    let guard = data.job.lock();
    match guard.as_ref() {
        Some(job) => HttpResponse::Ok().json(job.to_envelope()),
        None => HttpResponse::NotFound().json(ErrorResponse::new("no job has been submitted yet")),
    }
}

#[post("/api/send-path/pause")]
async fn pause(data: web::Data<AppState>) -> impl Responder {
    let guard = data.job.lock();
    match guard.as_ref() {
        Some(job) if job.is_active() => {
            job.control.pause_requested.store(true, Ordering::SeqCst);
            HttpResponse::Ok().json(job.to_envelope())
        }
        Some(job) => HttpResponse::Conflict().json(ErrorResponse::new(format!(
            "job is already {:?}",
            job.status
        ))),
        None => HttpResponse::NotFound().json(ErrorResponse::new("no active job")),
    }
}

#[post("/api/send-path/resume")]
async fn resume(data: web::Data<AppState>) -> impl Responder {
    let guard = data.job.lock();
    match guard.as_ref() {
        Some(job) if job.is_active() => {
            job.control.pause_requested.store(false, Ordering::SeqCst);
            job.control.resume.notify_one();
            HttpResponse::Ok().json(job.to_envelope())
        }
        Some(job) => HttpResponse::Conflict().json(ErrorResponse::new(format!(
            "job is already {:?}",
            job.status
        ))),
        None => HttpResponse::NotFound().json(ErrorResponse::new("no active job")),
    }
}

#[post("/api/send-path/cancel")]
async fn cancel(data: web::Data<AppState>) -> impl Responder {
    let guard = data.job.lock();
    match guard.as_ref() {
        Some(job) if job.is_active() => {
            job.control.cancel_requested.store(true, Ordering::SeqCst);
            // Wakes a paused job so it observes the cancel instead of
            // waiting indefinitely for a resume that will never come.
            job.control.resume.notify_one();
            HttpResponse::Ok().json(job.to_envelope())
        }
        Some(job) => HttpResponse::Conflict().json(ErrorResponse::new(format!(
            "job is already {:?}",
            job.status
        ))),
        None => HttpResponse::NotFound().json(ErrorResponse::new("no active job")),
    }
}

/// The image-to-path algorithms that would normally produce `points` here
/// (contour/hatch/fill tracing) are an external collaborator per the
/// device controller's non-goals; this endpoint accepts an already-produced
/// point list and, when `sendToController` is set, hands it straight to the
/// same job runner `POST /api/send-path` uses.
#[post("/api/visualize")]
async fn visualize(body: web::Json<VisualizeRequest>, data: web::Data<AppState>) -> impl Responder {
    let req = body.into_inner();
    if !req.send_to_controller {
        return HttpResponse::Ok().json(serde_json::json!({"pointCount": req.points.len()}));
    }
    let send_req = SendPathRequest {
        points: req.points,
        start_position: req.start_position,
        speed: req.speed,
    };
    match data.start_job(send_req) {
        Ok(()) => {
            let guard = data.job.lock();
            HttpResponse::Ok().json(guard.as_ref().map(JobState::to_envelope))
        }
        Err(msg) => HttpResponse::Conflict().json(ErrorResponse::new(msg)),
    }
}

#[get("/api/ping")]
async fn ping() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

pub fn start_api_server(bind_addr: &str, port: u16, app_state: AppState) -> std::io::Result<actix_web::dev::Server> {
    let bind_addr = bind_addr.to_string();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Methods", "GET,POST,OPTIONS"))
                    .add(("Access-Control-Allow-Headers", "Content-Type")),
            )
            .app_data(web::Data::new(app_state.clone()))
            .service(ping)
            .service(send_path)
            .service(send_path_status)
            .service(pause)
            .service(resume)
            .service(cancel)
            .service(visualize)
            .default_service(web::route().to(
                |req: actix_web::HttpRequest| async move {
                    if req.method() == actix_web::http::Method::OPTIONS {
                        HttpResponse::NoContent().finish()
                    } else {
                        HttpResponse::MethodNotAllowed()
                            .json(ErrorResponse::new("method not allowed"))
                    }
                },
            ))
    })
    .bind((bind_addr.as_str(), port))?
    .run();
    info!("supervisor listening on {}:{}", bind_addr, port);
    Ok(server)
}
