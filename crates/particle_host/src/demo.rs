//! Generated demo models and a wandering viewer.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;
use particle_engine::{MemoryHost, ViewerId};
use particle_model::{AnimatedModel, Color, Frame, ModelMetadata, ModelSource, ParticleTemplate, StaticModel};

/// A flat ring of `count` points.
pub fn ring(name: &str, radius: f64, count: usize) -> StaticModel {
    let particles = (0..count)
        .map(|i| {
            let angle = TAU * i as f64 / count as f64;
            let color = Color::new(0.5 + 0.5 * angle.cos() as f32, 0.2, 0.5 + 0.5 * angle.sin() as f32);
            ParticleTemplate::at(DVec3::new(angle.cos() * radius, 0.0, angle.sin() * radius), color)
        })
        .collect();
    StaticModel::new(name, particles, 100).with_metadata(metadata("flat ring"))
}

/// A tall double helix whose points fade in over `count / 40` ticks.
pub fn helix(name: &str, count: usize) -> StaticModel {
    let particles = (0..count)
        .map(|i| {
            let t = i as f64 / count as f64;
            let angle = t * TAU * 12.0 + if i % 2 == 0 { 0.0 } else { TAU / 2.0 };
            let offset = DVec3::new(angle.cos() * 1.5, t * 20.0, angle.sin() * 1.5);
            let delay = u32::try_from(i / 40).unwrap_or(u32::MAX);
            ParticleTemplate::new(offset, Some(Color::from_rgb8(80, 200, 255)), delay, 0.6)
        })
        .collect();
    StaticModel::new(name, particles, 200).with_metadata(metadata("double helix"))
}

/// A looping expanding-ring animation.
pub fn ripple(name: &str, frames: usize) -> AnimatedModel {
    let frames = (0..frames)
        .map(|f| {
            let radius = 0.5 + f as f64 * 0.4;
            let particles = ring(name, radius, 16 + f * 4).particles().to_vec();
            Frame::new(f, 100, particles)
        })
        .collect();
    AnimatedModel::new(name, frames, true, ModelSource::Generated).with_metadata(metadata("expanding ripple"))
}

fn metadata(description: &str) -> ModelMetadata {
    ModelMetadata {
        author: Some("particle_host".to_string()),
        description: Some(description.to_string()),
        tags: vec!["demo".to_string()],
        ..ModelMetadata::default()
    }
}

/// Walk a viewer in a circle until it disconnects.
pub async fn wander(host: Arc<MemoryHost>, viewer: ViewerId, centre: DVec3) {
    let mut interval = tokio::time::interval(Duration::from_millis(50));
    let mut step = 0u64;
    loop {
        interval.tick().await;
        let angle = step as f64 * 0.02;
        let position = centre + DVec3::new(angle.cos() * 8.0, 0.0, angle.sin() * 8.0);
        if !host.move_viewer(viewer, position) {
            break;
        }
        step += 1;
    }
}
