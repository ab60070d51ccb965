pub mod types;
pub mod energy;
pub mod battery;
pub mod tank;
pub mod component;
pub mod locomotive;
pub mod car;

pub use self::types::{PowerType, CarType, FuelType};
pub use self::battery::Battery;
pub use self::tank::Tank;
pub use self::component::{Component, CatenaryTally, Vehicle};
pub use self::locomotive::Locomotive;
pub use self::car::Car;
pub use self::energy::GRAVITY;

#[derive(Debug, Fail)]
pub enum VehicleError {
    #[fail(display = "depth of discharge must be in (0, 1], got {}", _0)]
    InvalidDepthOfDischarge(f64),
    #[fail(display = "unknown locomotive power type {}", _0)]
    UnknownPowerType(i32),
    #[fail(display = "unknown car type {}", _0)]
    UnknownCarType(i32),
}
