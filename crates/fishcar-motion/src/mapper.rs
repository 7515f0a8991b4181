//! Detection-to-velocity mapping.
//!
//! [`MotionMapper::calculate`] is a total function from a detection result to
//! a desired [`MotionVector`]; every input is range-safe by construction and
//! nothing here performs I/O.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{DetectionResult, MotionVector};

/// Tuning parameters for [`MotionMapper`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MapperConfig {
    /// Normalized-coordinate radius around center treated as "already there".
    pub deadzone: f64,
    /// Lateral gain applied to the normalized x offset.
    pub gain_x: f64,
    /// Longitudinal gain applied to the normalized y offset.
    pub gain_y: f64,
    /// Constant rotational component commanded while tracking.
    pub gain_rotation: f64,
    /// Magnitude ceiling for every output component.
    pub max_speed: f64,
    /// Magnitude floor for nonzero `vx`/`vy` outputs; overcomes static friction.
    pub min_speed: f64,
    /// Negate the normalized x offset.
    pub invert_x: bool,
    /// Negate the normalized y offset.
    pub invert_y: bool,
    /// Frame width the pixel x coordinate is normalized against.
    pub reference_width: u32,
    /// Frame height the pixel y coordinate is normalized against.
    pub reference_height: u32,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            deadzone: 0.1,
            gain_x: 1.0,
            gain_y: 1.0,
            gain_rotation: 0.2,
            max_speed: 0.8,
            min_speed: 0.15,
            invert_x: false,
            invert_y: false,
            reference_width: 640,
            reference_height: 480,
        }
    }
}

/// Maps a perceived target position to a desired velocity vector.
///
/// This is the sole producer of "no target" semantics: a frame without a
/// usable detection always yields [`MotionVector::idle`].
#[derive(Debug, Clone)]
pub struct MotionMapper {
    config: MapperConfig,
}

impl MotionMapper {
    /// Construct a mapper with the given tuning.
    pub const fn new(config: MapperConfig) -> Self {
        MotionMapper { config }
    }

    /// Borrow the tuning parameters.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Map a detection result to a desired velocity vector.
    ///
    /// No target, a centered target (both normalized axes inside the
    /// deadzone), or degenerate reference dimensions all yield the inactive
    /// zero vector. Otherwise the normalized offsets are scaled by the per
    /// axis gains, clamped to `max_speed`, and floored to `min_speed`.
    pub fn calculate(&self, detection: &DetectionResult) -> MotionVector {
        if !detection.has_target {
            return MotionVector::idle();
        }
        let Some((cx, cy)) = detection.center else {
            return MotionVector::idle();
        };

        let mut nx = normalize(cx, self.config.reference_width);
        let mut ny = normalize(cy, self.config.reference_height);
        if self.config.invert_x {
            nx = -nx;
        }
        if self.config.invert_y {
            ny = -ny;
        }

        // Small jitter around center means "don't move", regardless of gains.
        if nx.abs() < self.config.deadzone && ny.abs() < self.config.deadzone {
            return MotionVector::idle();
        }

        let max = self.config.max_speed;
        let vx = (nx * self.config.gain_x).clamp(-max, max);
        let vy = (ny * self.config.gain_y).clamp(-max, max);
        let omega = self.config.gain_rotation.clamp(-max, max);

        MotionVector::new(
            self.apply_min_speed(vx),
            self.apply_min_speed(vy),
            omega,
            true,
        )
    }

    /// Boost a nonzero component to the minimum speed, sign preserved.
    /// Exact zeros are left at zero.
    fn apply_min_speed(&self, value: f64) -> f64 {
        if value == 0.0 {
            return value;
        }
        value.signum() * value.abs().max(self.config.min_speed)
    }
}

/// Normalize a pixel coordinate into `[-1, 1]` against a reference length.
/// A zero reference normalizes to `0.0` rather than dividing by zero.
fn normalize(coord: f64, reference: u32) -> f64 {
    if reference == 0 {
        return 0.0;
    }
    coord / f64::from(reference) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    fn detection_at(cx: f64, cy: f64) -> DetectionResult {
        DetectionResult::target((cx, cy), (0, 0, 10, 10), 0.9)
    }

    fn mapper() -> MotionMapper {
        MotionMapper::new(MapperConfig::default())
    }

    #[test]
    fn test_no_target_is_idle() {
        let vector = mapper().calculate(&DetectionResult::none());
        assert_eq!(vector, MotionVector::idle());
    }

    #[test]
    fn test_missing_center_is_idle() {
        let detection = DetectionResult {
            has_target: true,
            center: None,
            bbox: None,
            confidence: Some(0.9),
        };
        assert_eq!(mapper().calculate(&detection), MotionVector::idle());
    }

    #[test]
    fn test_centered_target_is_idle() {
        // reference 640x480, center (320, 240) => nx = 320/640*2-1 = 0,
        // ny = 240/480*2-1 = 0; both inside the deadzone.
        let vector = mapper().calculate(&detection_at(320.0, 240.0));
        assert_eq!(vector, MotionVector::idle());
    }

    #[test]
    fn test_deadzone_independent_of_gains() {
        // Normalized offsets inside the deadzone must stay idle no matter
        // how aggressive the gains are.
        let config = MapperConfig {
            gain_x: 100.0,
            gain_y: 100.0,
            ..MapperConfig::default()
        };
        let mapper = MotionMapper::new(config);
        // (336, 252) => nx = 0.05, ny = 0.05; both below deadzone 0.1.
        let vector = mapper.calculate(&detection_at(336.0, 252.0));
        assert_eq!(vector, MotionVector::idle());
    }

    #[test]
    fn test_far_right_clamps_to_max_speed() {
        // x = 640 => nx = 640/640*2-1 = 1.0
        // vx = clamp(1.0 * 1.0, -0.8, 0.8) = 0.8
        let config = MapperConfig {
            invert_y: false,
            ..MapperConfig::default()
        };
        let mapper = MotionMapper::new(config);
        let vector = mapper.calculate(&detection_at(640.0, 240.0));
        assert!(vector.active);
        assert!((vector.vx - 0.8).abs() < EPSILON);
        assert!((vector.vy - 0.0).abs() < EPSILON);
        assert!((vector.omega - 0.2).abs() < EPSILON);
    }

    #[test]
    fn test_invert_flags_flip_sign() {
        let config = MapperConfig {
            invert_x: true,
            invert_y: false,
            ..MapperConfig::default()
        };
        let mapper = MotionMapper::new(config);
        let vector = mapper.calculate(&detection_at(640.0, 240.0));
        assert!((vector.vx - (-0.8)).abs() < EPSILON);
    }

    #[test]
    fn test_min_speed_floor_preserves_sign() {
        // (368, 240) => nx = 368/640*2-1 = 0.15, ny = 0.0; nx clears the
        // deadzone, and 0.15 * gain 1.0 = 0.15 equals the floor exactly.
        // Shrink the gain so the raw product dips below the floor.
        let config = MapperConfig {
            gain_x: 0.2,
            invert_y: false,
            ..MapperConfig::default()
        };
        let mapper = MotionMapper::new(config);
        let vector = mapper.calculate(&detection_at(368.0, 240.0));
        // raw vx = 0.15 * 0.2 = 0.03, boosted to min_speed 0.15
        assert!((vector.vx - 0.15).abs() < EPSILON);

        let vector = mapper.calculate(&detection_at(272.0, 240.0));
        // nx = 272/640*2-1 = -0.15 => raw vx = -0.03, boosted to -0.15
        assert!((vector.vx - (-0.15)).abs() < EPSILON);
    }

    #[test]
    fn test_min_speed_leaves_exact_zero_alone() {
        let config = MapperConfig {
            invert_y: false,
            ..MapperConfig::default()
        };
        let mapper = MotionMapper::new(config);
        // ny = 0 exactly; vy must stay 0 rather than being boosted.
        let vector = mapper.calculate(&detection_at(640.0, 240.0));
        assert_eq!(vector.vy, 0.0);
    }

    #[test]
    fn test_degenerate_reference_never_divides_by_zero() {
        let config = MapperConfig {
            reference_width: 0,
            reference_height: 0,
            ..MapperConfig::default()
        };
        let mapper = MotionMapper::new(config);
        // Both axes normalize to 0.0 and land in the deadzone.
        let vector = mapper.calculate(&detection_at(123.0, 456.0));
        assert_eq!(vector, MotionVector::idle());
    }

    #[test]
    fn test_rotation_is_constant_while_tracking() {
        // omega comes from configuration, not from the detection.
        let m = mapper();
        let a = m.calculate(&detection_at(640.0, 0.0));
        let b = m.calculate(&detection_at(0.0, 480.0));
        assert!((a.omega - b.omega).abs() < EPSILON);
        assert!((a.omega - 0.2).abs() < EPSILON);
    }
}
