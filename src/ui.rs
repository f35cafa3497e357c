// src/ui.rs
use crate::config::{DynamicsRequest, KinematicsRequest}; // Request bodies with reference-scenario defaults
use crate::engine::{run_dynamics, run_kinematics, DynamicsRun, DynamicsSeries, KinematicsRun}; // Run orchestration
use crate::error::{MotionError, MotionResult}; // Domain errors reported as JSON
use crate::kinematics::KinematicsSeries;
use crate::logic::IntegratorSettings;
use crate::vector_field::{Glyph, PlacedGlyph}; // Arrowhead placement along velocity/acceleration
use actix_web::{web, HttpResponse, Result}; // Actix-web types for request handling and HTTP responses
use base64::{engine::general_purpose, Engine as _}; // Base64 encoder for embedding image data
use image::ImageFormat; // Image encoding utilities for PNG output
use plotters::prelude::*; // Plotters plotting library prelude
use serde::Serialize; // Serde trait for JSON serialization
use std::io::{self, Cursor}; // IO utilities and Cursor for in-memory byte writing
use tracing::{info, warn};

// Image width in pixels
const W: u32 = 500;

// Image height in pixels
const H: u32 = 500;

#[derive(Serialize)]
struct GlyphSeries {
    velocity: Vec<PlacedGlyph>,     // Arrowheads at the tip of the scaled velocity vector
    acceleration: Vec<PlacedGlyph>, // Arrowheads at the tip of the scaled acceleration vector
}

#[derive(Serialize)]
struct KinematicsResponse {
    success: bool, // Always true; failures use ErrorResponse
    #[serde(flatten)]
    run: KinematicsRun, // Series, vector fields and derived expressions
    #[serde(skip_serializing_if = "Option::is_none")]
    glyphs: Option<GlyphSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trajectory_image: Option<String>, // Base64-encoded PNG of the whole path
}

#[derive(Serialize)]
struct DynamicsResponse {
    success: bool,
    #[serde(flatten)]
    run: DynamicsRun, // Series, energy summary and integrator counters
    #[serde(skip_serializing_if = "Option::is_none")]
    trajectory_image: Option<String>, // Base64-encoded PNG of both mass trajectories
    #[serde(skip_serializing_if = "Option::is_none")]
    energy_image: Option<String>, // Base64-encoded PNG of T, U, E over time
    #[serde(skip_serializing_if = "Option::is_none")]
    angle_image: Option<String>, // Base64-encoded PNG of φ and ψ over time
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: &'static str, // Stable error tag
    message: String,    // Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    last_time: Option<f64>, // Last time reached, for divergence
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorDetail,
}

// Domain failures are the caller's problem (bad law, bad parameters, divergent run): 422 with details
fn error_response(err: &MotionError) -> HttpResponse {
    warn!(kind = err.kind(), %err, "run rejected");
    HttpResponse::UnprocessableEntity().json(ErrorResponse {
        success: false,
        error: ErrorDetail { kind: err.kind(), message: err.to_string(), last_time: err.last_time() },
    })
}

pub async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub async fn kinematics_handler(params: web::Json<KinematicsRequest>) -> Result<HttpResponse> {
    let request = params.into_inner();
    info!(radius = %request.radius, angle = %request.angle, samples = request.samples, "kinematics request");

    // Run the CPU-bound work off the async workers; render failures surface as io::Error (500)
    let outcome = web::block(move || compute_kinematics(&request)).await??;

    Ok(match outcome {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(err) => error_response(&err),
    })
}

pub async fn dynamics_handler(params: web::Json<DynamicsRequest>) -> Result<HttpResponse> {
    let request = params.into_inner();
    info!(phi0 = request.phi0, psi0 = request.psi0, t_end = request.t_end, samples = request.samples, "dynamics request");

    let outcome = web::block(move || compute_dynamics(&request)).await??;

    Ok(match outcome {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(err) => error_response(&err),
    })
}

fn compute_kinematics(request: &KinematicsRequest) -> io::Result<MotionResult<KinematicsResponse>> {
    // Parse the law and build the grid; any failure here is a domain error
    let run = match request.law().and_then(|law| run_kinematics(&law, &request.grid()?)) {
        Ok(run) => run,
        Err(err) => return Ok(Err(err)),
    };

    // Orient the arrowhead template along each vector at the requested scales
    let glyphs = request.include_glyphs.then(|| {
        let s = &run.series;
        let arrow = Glyph::arrowhead();
        GlyphSeries {
            velocity: arrow.place_series(&s.x, &s.y, &s.vx, &s.vy, request.velocity_scale),
            acceleration: arrow.place_series(&s.x, &s.y, &s.ax, &s.ay, request.acceleration_scale),
        }
    });

    let trajectory_image = if request.include_plot { Some(plot_point_trajectory(&run.series)?) } else { None };

    Ok(Ok(KinematicsResponse { success: true, run, glyphs, trajectory_image }))
}

fn compute_dynamics(request: &DynamicsRequest) -> io::Result<MotionResult<DynamicsResponse>> {
    // Validate parameters and grid before any integration starts
    let run = match request.params().and_then(|params| {
        run_dynamics(params, request.initial(), &request.grid()?, IntegratorSettings::default())
    }) {
        Ok(run) => run,
        Err(err) => return Ok(Err(err)),
    };

    let (trajectory_image, energy_image, angle_image) = if request.include_plot {
        let limit = run.params.rod_length_1 + run.params.rod_length_2 + 0.5;
        (
            Some(plot_pendulum_trajectories(&run.series, limit)?),
            Some(plot_energy(&run.series)?),
            Some(plot_angles(&run.series)?),
        )
    } else {
        (None, None, None)
    };

    Ok(Ok(DynamicsResponse { success: true, run, trajectory_image, energy_image, angle_image }))
}

// Encodes a raw RGB buffer as a PNG data URL
fn encode_png(pixel_buffer: Vec<u8>) -> io::Result<String> {
    // Create an image buffer from raw RGB pixels
    let img_buffer = image::ImageBuffer::from_raw(W, H, pixel_buffer)
        .ok_or_else(|| io::Error::other("Failed to create image buffer"))?;

    let dynamic_image = image::DynamicImage::ImageRgb8(img_buffer);

    // Create an in-memory buffer to hold the PNG file bytes
    let mut png_buffer = Cursor::new(Vec::new());

    // Encode raw RGB pixels into PNG format
    dynamic_image
        .write_to(&mut png_buffer, ImageFormat::Png)
        .map_err(|e| io::Error::other(e.to_string()))?;

    // Convert PNG bytes into a Base64 data URL
    Ok(format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png_buffer.into_inner())))
}

/// Full path of the prescribed-trajectory point as a PNG data URL.
pub fn plot_point_trajectory(series: &KinematicsSeries) -> io::Result<String> {
    // Square, symmetric bounds around the origin with padding
    let reach = series.x.iter().chain(series.y.iter()).fold(0.0f64, |acc, v| acc.max(v.abs()));
    let limit = reach + 0.5;

    // Allocate RGB pixel buffer (3 bytes per pixel)
    let mut pixel_buffer = vec![0u8; (W * H * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut pixel_buffer, (W, H)).into_drawing_area();
        root.fill(&WHITE).map_err(io::Error::other)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Point trajectory", ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_cartesian_2d(-limit..limit, -limit..limit)
            .map_err(io::Error::other)?;

        chart.configure_mesh().draw().map_err(io::Error::other)?;

        chart
            .draw_series(LineSeries::new(
                series.x.iter().zip(series.y.iter()).map(|(&x, &y)| (x, y)),
                BLUE.mix(0.75).stroke_width(1),
            ))
            .map_err(io::Error::other)?;

        // Mark the starting point
        chart
            .draw_series(std::iter::once(Circle::new((series.x[0], series.y[0]), 4, RED.filled())))
            .map_err(io::Error::other)?;

        root.present().map_err(io::Error::other)?;
    }

    encode_png(pixel_buffer)
}

/// Paths of both pendulum masses as a PNG data URL.
pub fn plot_pendulum_trajectories(series: &DynamicsSeries, limit: f64) -> io::Result<String> {
    let mut pixel_buffer = vec![0u8; (W * H * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut pixel_buffer, (W, H)).into_drawing_area();
        root.fill(&WHITE).map_err(io::Error::other)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Mass trajectories", ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_cartesian_2d(-limit..limit, -limit..limit)
            .map_err(io::Error::other)?;

        chart.configure_mesh().draw().map_err(io::Error::other)?;

        // One line per mass: blue for the upper, red for the lower
        let paths = [(&series.x1, &series.y1, BLUE.mix(0.75)), (&series.x2, &series.y2, RED.mix(0.75))];
        for (xs, ys, color) in paths {
            chart
                .draw_series(LineSeries::new(xs.iter().zip(ys.iter()).map(|(&x, &y)| (x, y)), color.stroke_width(1)))
                .map_err(io::Error::other)?;
        }

        root.present().map_err(io::Error::other)?;
    }

    encode_png(pixel_buffer)
}

/// Kinetic, potential and total energy against time as a PNG data URL.
pub fn plot_energy(series: &DynamicsSeries) -> io::Result<String> {
    plot_time_series(
        "Energy",
        &series.t,
        &[
            ("T", series.kinetic.as_slice(), GREEN),
            ("U", series.potential.as_slice(), BLUE),
            ("E", series.total.as_slice(), RED),
        ],
    )
}

/// Rod angles φ(t) and ψ(t) as a PNG data URL.
pub fn plot_angles(series: &DynamicsSeries) -> io::Result<String> {
    plot_time_series("Angles", &series.t, &[("phi", series.phi.as_slice(), BLUE), ("psi", series.psi.as_slice(), RED)])
}

// Labelled curves against a shared time axis, with a legend
fn plot_time_series(caption: &str, t: &[f64], curves: &[(&str, &[f64], RGBColor)]) -> io::Result<String> {
    let t0 = t.first().copied().unwrap_or(0.0);
    let t1 = t.last().copied().unwrap_or(1.0).max(t0 + f64::EPSILON);

    // Shared vertical range over all curves
    let (lo, hi) = curves
        .iter()
        .flat_map(|(_, values, _)| values.iter())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let pad = ((hi - lo) * 0.05).max(1e-6);

    let mut pixel_buffer = vec![0u8; (W * H * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut pixel_buffer, (W, H)).into_drawing_area();
        root.fill(&WHITE).map_err(io::Error::other)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(caption, ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(t0..t1, (lo - pad)..(hi + pad))
            .map_err(io::Error::other)?;

        chart.configure_mesh().x_desc("t").draw().map_err(io::Error::other)?;

        for &(label, values, color) in curves {
            chart
                .draw_series(LineSeries::new(
                    t.iter().zip(values.iter()).map(|(&time, &v)| (time, v)),
                    color.stroke_width(1),
                ))
                .map_err(io::Error::other)?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(io::Error::other)?;

        root.present().map_err(io::Error::other)?;
    }

    encode_png(pixel_buffer)
}

/// Registers the API routes; shared by `main` and the handler tests.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health_handler))
            .route("/kinematics", web::post().to(kinematics_handler))
            .route("/dynamics", web::post().to(dynamics_handler)),
    );
}
