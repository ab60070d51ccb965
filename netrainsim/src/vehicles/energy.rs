//! Efficiency curves and conversion constants of the energy model.
use super::types::{PowerType, FuelType};

pub const DEFAULT_LOCOMOTIVE_EMPTY_WEIGHT: f64 = 180.0;
pub const DEFAULT_NOTCHES: u32 = 8;
pub const DEFAULT_LOCOMOTIVE_MAX_SPEED: f64 = 100.0 / 3.0;

pub const LOCOMOTIVE_TANK_CAPACITY: f64 = 20065.0;
pub const LOCOMOTIVE_TANK_INITIAL: f64 = 0.9;
pub const LOCOMOTIVE_TANK_DOD: f64 = 0.8;
pub const LOCOMOTIVE_BATTERY_DOD: f64 = 0.9;
pub const LOCOMOTIVE_BATTERY_CRATE: f64 = 2.0;
pub const ELECTRIC_BATTERY_CAPACITY: f64 = 5000.0;
pub const HYBRID_BATTERY_CAPACITY: f64 = 2400.0;
pub const LOCOMOTIVE_BATTERY_INITIAL: f64 = 0.6;
pub const HYBRID_RECHARGE_UPPER_SOC: f64 = 0.61;
pub const HYBRID_RECHARGE_LOWER_SOC: f64 = 0.55;
pub const DEFAULT_RECHARGE_UPPER_SOC: f64 = 0.9;
pub const DEFAULT_RECHARGE_LOWER_SOC: f64 = 0.5;

pub const TENDER_TANK_CAPACITY: f64 = 87064.471;
pub const HYDROGEN_TENDER_TANK_CAPACITY: f64 = 63584.048;
pub const TENDER_INITIAL: f64 = 0.9;
pub const TENDER_TANK_DOD: f64 = 0.9;
pub const TENDER_BATTERY_CAPACITY: f64 = 10000.0;
pub const TENDER_BATTERY_DOD: f64 = 0.9;
pub const TENDER_BATTERY_CRATE: f64 = 2.0;

pub const BATTERY_EFFICIENCY: f64 = 0.965;
pub const REGENERATION_GAMMA: f64 = 0.65;
pub const GRAVITY: f64 = 9.8066;

/// Liters of fuel per kWh at the tank.
pub fn conversion_factor(fuel: FuelType) -> f64 {
    match fuel {
        FuelType::Diesel => 0.1005,
        FuelType::Biodiesel => 67.0 / 620.0,
        FuelType::Hydrogen => 0.002995,
        FuelType::Electricity => 1.0,
    }
}

/// Tons per liter.
pub fn density(fuel: FuelType) -> f64 {
    match fuel {
        FuelType::Diesel => 0.00085,
        FuelType::Biodiesel => 0.00088,
        FuelType::Hydrogen => 0.000099836,
        FuelType::Electricity => 0.0,
    }
}

/// Grams of CO2 per liter burned.
pub fn emissions(fuel: FuelType, liters: f64) -> f64 {
    match fuel {
        FuelType::Diesel => 2559.5 * liters,
        FuelType::Biodiesel => 2226.7 * liters,
        _ => 0.0,
    }
}

pub fn wheel_to_dc_bus_efficiency(speed: f64) -> f64 {
    let kmh = speed * 3.6;
    if kmh <= 58.2 {
        0.2 + 0.0261 * kmh - 0.0003 * kmh.powi(2) + 0.000001 * kmh.powi(3)
    } else {
        0.9
    }
}

pub fn generator_efficiency(power_type: PowerType, portion: f64) -> f64 {
    match power_type {
        PowerType::DieselHybrid | PowerType::BiodieselHybrid => {
            -0.24 * portion.powi(2) + 0.3859 * portion + 0.29
        }
        PowerType::HydrogenHybrid => -0.0937 * portion.powi(2) + 0.002 * portion + 0.5609,
        _ => 1.0,
    }
}

pub fn dc_bus_to_tank_efficiency(power_type: PowerType, portion: f64) -> f64 {
    match power_type {
        PowerType::Diesel | PowerType::Biodiesel | PowerType::DieselElectric => {
            -0.24 * portion.powi(2) + 0.3859 * portion + 0.29
        }
        PowerType::Electric => BATTERY_EFFICIENCY,
        _ => generator_efficiency(power_type, portion),
    }
}

pub fn driveline_efficiency(power_type: PowerType, speed: f64, portion: f64) -> f64 {
    wheel_to_dc_bus_efficiency(speed) * dc_bus_to_tank_efficiency(power_type, portion)
}

/// Engine power portion band `(low, high)` of best hybrid efficiency.
pub fn hybrid_efficient_band(power_type: PowerType) -> (f64, f64) {
    match power_type {
        PowerType::DieselHybrid | PowerType::BiodieselHybrid => (0.7, 0.9),
        PowerType::HydrogenHybrid => (0.0, 0.5),
        _ => (0.0, 1.0),
    }
}

pub fn power_to_energy_kwh(power_w: f64, time_step: f64) -> f64 {
    power_w * time_step / 3.6e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_efficiency_is_continuous_enough() {
        let below = wheel_to_dc_bus_efficiency(58.2 / 3.6);
        assert!((below - 0.9).abs() < 0.05);
        assert_eq!(wheel_to_dc_bus_efficiency(30.0), 0.9);
        assert!((wheel_to_dc_bus_efficiency(0.0) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn diesel_engine_curve() {
        let full = dc_bus_to_tank_efficiency(PowerType::Diesel, 1.0);
        assert!((full - 0.4359).abs() < 1e-9);
        assert_eq!(dc_bus_to_tank_efficiency(PowerType::Electric, 0.3), BATTERY_EFFICIENCY);
    }
}
