//! Controller Configuration Loader
//!
//! Parses `controller.cfg`, an INI-style file describing the board geometry,
//! motion limits, and HTTP bind address. Mirrors the shape of Klipper's own
//! `printer.cfg` loader: strongly-typed sections built from a generic INI
//! parser, with every missing key surfaced as a contextual error.

use anyhow::{Context, Result};
use configparser::ini::Ini;
use polargraph_kinematics::BoardGeometry;
use std::path::Path;

/// Motion limits that are not part of the physical geometry but bound the
/// controller's behavior (spec §4.2 "Speed policy", §4.4 "Queue contract").
#[derive(Debug, Clone, Copy)]
pub struct MotionLimits {
    pub max_speed: u32,
    pub travel_speed: u32,
    pub max_queue_size: usize,
    pub min_pulse_us: u64,
}

/// Where the `/api/*` server binds.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// The fully parsed controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub geometry: BoardGeometry,
    pub limits: MotionLimits,
    pub http: HttpConfig,
}

/// `configparser`'s getters return `Result<Option<T>, String>`: the outer
/// `Err` is a parse failure, the inner `None` is "key absent". Both missing
/// cases are reported identically as a contextual error (spec "every
/// missing key surfaced as a contextual error").
fn required<T>(value: std::result::Result<Option<T>, String>, key: &str) -> Result<T> {
    value
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("{key} could not be parsed"))?
        .with_context(|| format!("{key} not found"))
}

impl ControllerConfig {
    /// Loads and parses the configuration file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("failed to load configuration file: {path:?}"))?;

        let geometry = BoardGeometry {
            width_mm: required(config.getfloat("board", "width_mm"), "[board] width_mm")?,
            height_mm: required(config.getfloat("board", "height_mm"), "[board] height_mm")?,
            pen_offset_mm: required(
                config.getfloat("board", "pen_offset_mm"),
                "[board] pen_offset_mm",
            )?,
            motor_offset_mm: required(
                config.getfloat("board", "motor_offset_mm"),
                "[board] motor_offset_mm",
            )?,
            spool_diameter_mm: required(
                config.getfloat("motors", "spool_diameter_mm"),
                "[motors] spool_diameter_mm",
            )?,
            steps_per_rev: required(
                config.getuint("motors", "steps_per_rev"),
                "[motors] steps_per_rev",
            )? as u32,
            microsteps: required(config.getuint("motors", "microsteps"), "[motors] microsteps")?
                as u32,
        };

        let limits = MotionLimits {
            max_speed: required(config.getuint("motion", "max_speed"), "[motion] max_speed")?
                as u32,
            travel_speed: required(
                config.getuint("motion", "travel_speed"),
                "[motion] travel_speed",
            )? as u32,
            max_queue_size: required(
                config.getuint("motion", "max_queue_size"),
                "[motion] max_queue_size",
            )? as usize,
            min_pulse_us: required(
                config.getuint("motion", "min_pulse_us"),
                "[motion] min_pulse_us",
            )?,
        };

        let http = HttpConfig {
            bind_addr: config
                .get("http", "bind_addr")
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: required(config.getuint("http", "port"), "[http] port")? as u16,
        };

        Ok(Self {
            geometry,
            limits,
            http,
        })
    }

    /// Returns a sensible default configuration for tests and `--mock-gpio`
    /// runs where no `controller.cfg` is supplied.
    pub fn default_for_tests() -> Self {
        Self {
            geometry: BoardGeometry {
                width_mm: 1150.0,
                height_mm: 830.0,
                pen_offset_mm: 50.0,
                motor_offset_mm: 100.0,
                spool_diameter_mm: 12.0,
                steps_per_rev: 200,
                microsteps: 16,
            },
            limits: MotionLimits {
                max_speed: 4000,
                travel_speed: 2500,
                max_queue_size: 3000,
                min_pulse_us: 5,
            },
            http: HttpConfig {
                bind_addr: "127.0.0.1".to_string(),
                port: 8080,
            },
        }
    }
}
