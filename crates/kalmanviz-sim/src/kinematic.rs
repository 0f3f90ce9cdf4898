use kalmanviz_core::{
    AgentState, Capabilities, Dimensions, Engine, EngineError, ErrorModel, ErrorModelShape,
    ErrorSpec, GoalState, Normal1,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal, StandardNormal};
use tracing::{trace, warn};

use crate::{DEFAULT_SEED, SimError};

const DEFAULT_STD_DEV: f64 = 0.001;

/// 2-D gaussian movement noise with its lower Cholesky factor.
#[derive(Debug, Clone, Copy)]
struct Gaussian2 {
    mean: [f64; 2],
    covariance: [f64; 4],
    factor: [f64; 3],
}

impl Gaussian2 {
    /// Requires a symmetric positive semi-definite covariance with a positive leading entry.
    fn new(mean: [f64; 2], covariance: [f64; 4]) -> Option<Self> {
        let [a, b, c, d] = covariance;
        if mean.iter().chain(&covariance).any(|v| !v.is_finite()) || b != c || a <= 0.0 {
            return None;
        }
        let l11 = a.sqrt();
        let l21 = b / l11;
        let rest = d - l21 * l21;
        if rest < 0.0 {
            return None;
        }
        Some(Self {
            mean,
            covariance,
            factor: [l11, l21, rest.sqrt()],
        })
    }

    fn sample(&self, rng: &mut SmallRng) -> (f64, f64) {
        let z1: f64 = StandardNormal.sample(rng);
        let z2: f64 = StandardNormal.sample(rng);
        let [l11, l21, l22] = self.factor;
        (
            self.mean[0] + l11 * z1,
            self.mean[1] + l21 * z1 + l22 * z2,
        )
    }
}

impl Default for Gaussian2 {
    fn default() -> Self {
        let variance = DEFAULT_STD_DEV * DEFAULT_STD_DEV;
        Self {
            mean: [0.0, 0.0],
            covariance: [variance, 0.0, 0.0, variance],
            factor: [DEFAULT_STD_DEV, 0.0, DEFAULT_STD_DEV],
        }
    }
}

/// Continuous universe with one agent, an optional goal and noisy actuation.
///
/// Each tick the actual velocity and heading are the commanded ones plus
/// proportional noise. The agent only moves while the commanded velocity is
/// non-zero and stays clamped to the domain. The belief integrates noisy
/// readings of the actual velocity and heading.
#[derive(Debug, Clone)]
pub struct KinematicUniverse {
    dimensions: Dimensions,
    shape: ErrorModelShape,
    step: u64,
    command_velocity: f64,
    command_heading: f64,
    actual: AgentState,
    belief: AgentState,
    goal: GoalState,
    rotation: Normal<f64>,
    movement: Normal<f64>,
    position: Normal<f64>,
    gaussian: Gaussian2,
    rng: SmallRng,
}

impl KinematicUniverse {
    pub fn new(width: f64, height: f64) -> Result<Self, SimError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) {
            return Err(SimError::InvalidDimensions { width, height });
        }
        let start = AgentState::new(width / 2.0, height / 2.0, 0.0, 0.0);
        let noise = Normal::new(0.0, DEFAULT_STD_DEV)?;
        Ok(Self {
            dimensions: Dimensions::new(width, height),
            shape: ErrorModelShape::Channels,
            step: 0,
            command_velocity: 0.0,
            command_heading: 0.0,
            actual: start,
            belief: start,
            goal: GoalState::default(),
            rotation: noise,
            movement: noise,
            position: noise,
            gaussian: Gaussian2::default(),
            rng: SmallRng::seed_from_u64(DEFAULT_SEED),
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    #[must_use]
    pub fn with_error_shape(mut self, shape: ErrorModelShape) -> Self {
        self.shape = shape;
        self
    }

    /// Places the agent (actual and belief) at `(x, y)`, clamped to the domain.
    #[must_use]
    pub fn with_start(mut self, x: f64, y: f64) -> Self {
        let x = x.clamp(0.0, self.dimensions.width);
        let y = y.clamp(0.0, self.dimensions.height);
        self.actual = AgentState::new(x, y, 0.0, 0.0);
        self.belief = self.actual;
        self
    }

    /// Step size is proportional to `expected`; zero commands stay exact.
    fn perturb(&mut self, expected: f64, noise: Normal<f64>) -> f64 {
        expected + expected * noise.sample(&mut self.rng)
    }

    fn clamp_x(&self, x: f64) -> f64 {
        x.clamp(0.0, self.dimensions.width)
    }

    fn clamp_y(&self, y: f64) -> f64 {
        y.clamp(0.0, self.dimensions.height)
    }

    fn advance_actual(&mut self) {
        if self.shape == ErrorModelShape::Gaussian {
            self.actual.velocity = self.command_velocity;
            self.actual.heading = self.command_heading;
        } else {
            self.actual.velocity = self.perturb(self.command_velocity, self.movement);
            self.actual.heading = self.perturb(self.command_heading, self.rotation);
        }
        if self.command_velocity == 0.0 {
            return;
        }

        let (dx, dy) = heading_step(self.actual.heading, self.actual.velocity);
        let expected_x = self.clamp_x(self.actual.x + dx);
        let expected_y = self.clamp_y(self.actual.y + dy);
        let (x, y) = if self.shape == ErrorModelShape::Gaussian {
            let (nx, ny) = self.gaussian.sample(&mut self.rng);
            (expected_x + nx, expected_y + ny)
        } else {
            (
                self.perturb(expected_x, self.position),
                self.perturb(expected_y, self.position),
            )
        };
        self.actual.x = self.clamp_x(x);
        self.actual.y = self.clamp_y(y);
    }

    fn advance_belief(&mut self) {
        let (velocity, heading) = if self.shape == ErrorModelShape::Gaussian {
            (self.actual.velocity, self.actual.heading)
        } else {
            (
                self.perturb(self.actual.velocity, self.movement),
                self.perturb(self.actual.heading, self.rotation),
            )
        };
        self.belief.velocity = velocity;
        self.belief.heading = heading;
        if self.command_velocity != 0.0 {
            let (dx, dy) = heading_step(heading, velocity);
            self.belief.x = self.clamp_x(self.belief.x + dx);
            self.belief.y = self.clamp_y(self.belief.y + dy);
        }
    }

    fn channel_noise(channel: &'static str, spec: ErrorSpec) -> Option<Normal<f64>> {
        let ErrorSpec::Scalar(Normal1 { mean, std_dev }) = spec else {
            warn!(target: "kalmanviz::sim", channel, ?spec, "expected a scalar error spec");
            return None;
        };
        match Normal::new(mean, std_dev) {
            Ok(normal) => {
                trace!(target: "kalmanviz::sim", channel, mean, std_dev, "error channel updated");
                Some(normal)
            }
            Err(err) => {
                warn!(target: "kalmanviz::sim", channel, mean, std_dev, error = %err, "rejected error distribution");
                None
            }
        }
    }
}

fn heading_step(heading: f64, velocity: f64) -> (f64, f64) {
    (heading.cos() * velocity, heading.sin() * velocity)
}

fn describe(normal: &Normal<f64>) -> Normal1 {
    Normal1::new(normal.mean(), normal.std_dev())
}

impl Engine for KinematicUniverse {
    fn capabilities(&self) -> Capabilities {
        Capabilities::continuous(self.shape)
    }

    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn tick(&mut self) -> Result<(), EngineError> {
        self.advance_actual();
        self.advance_belief();
        if !self.actual.x.is_finite() || !self.actual.y.is_finite() {
            return Err(EngineError::new("agent position became non-finite"));
        }
        self.step += 1;
        trace!(
            target: "kalmanviz::sim",
            step = self.step,
            x = self.actual.x,
            y = self.actual.y,
            velocity = self.actual.velocity,
            heading = self.actual.heading,
            "universe ticked"
        );
        Ok(())
    }

    fn step(&self) -> u64 {
        self.step
    }

    fn goal(&self) -> Option<GoalState> {
        Some(self.goal)
    }

    fn actual_state(&self) -> Option<AgentState> {
        Some(self.actual)
    }

    fn belief_state(&self) -> Option<AgentState> {
        Some(self.belief)
    }

    fn error_model(&self) -> Option<ErrorModel> {
        match self.shape {
            ErrorModelShape::None => None,
            ErrorModelShape::Channels => Some(ErrorModel::Channels {
                rotation: describe(&self.rotation),
                movement: describe(&self.movement),
                position: describe(&self.position),
            }),
            ErrorModelShape::Gaussian => Some(ErrorModel::Gaussian {
                mean: self.gaussian.mean,
                covariance: self.gaussian.covariance,
            }),
        }
    }

    fn set_goal(&mut self, x: f64, y: f64) {
        let inside = x > 0.0 && x < self.dimensions.width && y > 0.0 && y < self.dimensions.height;
        if inside {
            self.goal = GoalState::new(x, y);
        } else {
            self.goal = GoalState::new(-1.0, -1.0);
            warn!(
                target: "kalmanviz::sim",
                x, y,
                width = self.dimensions.width,
                height = self.dimensions.height,
                "goal outside universe bounds; goal cleared"
            );
        }
    }

    fn set_movement_error(&mut self, spec: ErrorSpec) {
        match spec {
            ErrorSpec::Gaussian { mean, covariance } if self.shape == ErrorModelShape::Gaussian => {
                match Gaussian2::new(mean, covariance) {
                    Some(gaussian) => self.gaussian = gaussian,
                    None => warn!(
                        target: "kalmanviz::sim",
                        ?mean, ?covariance,
                        "covariance must be symmetric positive semi-definite"
                    ),
                }
            }
            spec => {
                if let Some(normal) = Self::channel_noise("movement", spec) {
                    self.movement = normal;
                }
            }
        }
    }

    fn set_rotation_error(&mut self, spec: ErrorSpec) {
        if let Some(normal) = Self::channel_noise("rotation", spec) {
            self.rotation = normal;
        }
    }

    fn set_position_error(&mut self, spec: ErrorSpec) {
        if let Some(normal) = Self::channel_noise("position", spec) {
            self.position = normal;
        }
    }

    fn set_velocity(&mut self, velocity: f64) {
        self.command_velocity = velocity;
    }

    fn set_rotation(&mut self, theta: f64) {
        self.command_heading = theta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_domains() {
        assert!(KinematicUniverse::new(0.0, 10.0).is_err());
        assert!(KinematicUniverse::new(10.0, f64::INFINITY).is_err());
    }

    #[test]
    fn agent_stays_put_without_velocity() {
        let mut universe = KinematicUniverse::new(30.0, 30.0).unwrap();
        universe.set_rotation(1.0);
        for _ in 0..10 {
            universe.tick().unwrap();
        }
        let actual = universe.actual_state().unwrap();
        assert_eq!((actual.x, actual.y), (15.0, 15.0));
        assert_eq!(universe.step(), 10);
    }

    #[test]
    fn agent_is_clamped_to_domain() {
        let mut universe = KinematicUniverse::new(20.0, 20.0).unwrap().with_seed(7);
        universe.set_velocity(5.0);
        for _ in 0..50 {
            universe.tick().unwrap();
        }
        let actual = universe.actual_state().unwrap();
        assert!((0.0..=20.0).contains(&actual.x));
        assert!((0.0..=20.0).contains(&actual.y));
        assert!(actual.x > 19.0);
    }

    #[test]
    fn out_of_bounds_goal_is_cleared() {
        let mut universe = KinematicUniverse::new(30.0, 30.0).unwrap();
        universe.set_goal(3.0, 5.0);
        assert_eq!(universe.goal(), Some(GoalState::new(3.0, 5.0)));
        universe.set_goal(31.0, 5.0);
        assert!(!universe.goal().unwrap().is_set());
    }

    #[test]
    fn invalid_distributions_keep_previous_parameters() {
        let mut universe = KinematicUniverse::new(30.0, 30.0).unwrap();
        universe.set_rotation_error(ErrorSpec::Scalar(Normal1::new(0.0, 0.2)));
        universe.set_rotation_error(ErrorSpec::Scalar(Normal1::new(0.0, -1.0)));
        let Some(ErrorModel::Channels { rotation, .. }) = universe.error_model() else {
            panic!("channels model expected");
        };
        assert_eq!(rotation, Normal1::new(0.0, 0.2));
    }

    #[test]
    fn gaussian_model_validates_covariance() {
        let mut universe = KinematicUniverse::new(30.0, 30.0)
            .unwrap()
            .with_error_shape(ErrorModelShape::Gaussian);
        universe.set_movement_error(ErrorSpec::Gaussian {
            mean: [0.0, 0.0],
            covariance: [1.0, 0.5, 0.5, 1.0],
        });
        universe.set_movement_error(ErrorSpec::Gaussian {
            mean: [0.0, 0.0],
            covariance: [1.0, 2.0, 2.0, 1.0],
        });
        assert_eq!(
            universe.error_model(),
            Some(ErrorModel::Gaussian {
                mean: [0.0, 0.0],
                covariance: [1.0, 0.5, 0.5, 1.0],
            })
        );
        universe.set_velocity(1.0);
        universe.tick().unwrap();
        let actual = universe.actual_state().unwrap();
        assert_eq!(actual.velocity, 1.0);
    }

    #[test]
    fn seeded_universes_are_reproducible() {
        let run = || {
            let mut universe = KinematicUniverse::new(30.0, 30.0).unwrap().with_seed(99);
            universe.set_velocity(1.0);
            universe.set_rotation(0.3);
            for _ in 0..5 {
                universe.tick().unwrap();
            }
            universe.actual_state().unwrap()
        };
        assert_eq!(run(), run());
    }
}
