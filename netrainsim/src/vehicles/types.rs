use super::VehicleError;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PowerType {
    Diesel,
    Electric,
    Biodiesel,
    DieselElectric,
    DieselHybrid,
    HydrogenHybrid,
    BiodieselHybrid,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CarType {
    Cargo,
    DieselTender,
    BatteryTender,
    HydrogenTender,
    BiodieselTender,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FuelType {
    Diesel,
    Biodiesel,
    Hydrogen,
    Electricity,
}

impl PowerType {
    pub fn from_code(code: i32) -> Result<PowerType, VehicleError> {
        use self::PowerType::*;
        Ok(match code {
            0 => Diesel,
            1 => Electric,
            2 => Biodiesel,
            3 => DieselElectric,
            4 => DieselHybrid,
            5 => HydrogenHybrid,
            6 => BiodieselHybrid,
            x => return Err(VehicleError::UnknownPowerType(x)),
        })
    }

    pub fn is_battery_only(&self) -> bool {
        *self == PowerType::Electric
    }

    pub fn is_tank_only(&self) -> bool {
        match self {
            PowerType::Diesel | PowerType::Biodiesel | PowerType::DieselElectric => true,
            _ => false,
        }
    }

    pub fn is_hybrid(&self) -> bool {
        match self {
            PowerType::DieselHybrid | PowerType::HydrogenHybrid | PowerType::BiodieselHybrid => true,
            _ => false,
        }
    }

    pub fn is_rechargeable(&self) -> bool {
        self.is_battery_only() || self.is_hybrid()
    }

    /// Fuel held in the locomotive's own tank, if it has one.
    pub fn fuel(&self) -> FuelType {
        match self {
            PowerType::Diesel | PowerType::DieselElectric | PowerType::DieselHybrid => FuelType::Diesel,
            PowerType::Biodiesel | PowerType::BiodieselHybrid => FuelType::Biodiesel,
            PowerType::HydrogenHybrid => FuelType::Hydrogen,
            PowerType::Electric => FuelType::Electricity,
        }
    }

    /// Tender type able to feed this locomotive.
    pub fn tender(&self) -> CarType {
        match self {
            PowerType::Diesel | PowerType::DieselElectric | PowerType::DieselHybrid => CarType::DieselTender,
            PowerType::Electric => CarType::BatteryTender,
            PowerType::Biodiesel | PowerType::BiodieselHybrid => CarType::BiodieselTender,
            PowerType::HydrogenHybrid => CarType::HydrogenTender,
        }
    }
}

impl CarType {
    pub fn from_code(code: i32) -> Result<CarType, VehicleError> {
        use self::CarType::*;
        Ok(match code {
            0 => Cargo,
            1 => DieselTender,
            2 => BatteryTender,
            3 => HydrogenTender,
            4 => BiodieselTender,
            x => return Err(VehicleError::UnknownCarType(x)),
        })
    }

    pub fn is_tender(&self) -> bool {
        *self != CarType::Cargo
    }

    pub fn is_rechargeable(&self) -> bool {
        *self == CarType::BatteryTender
    }

    pub fn fuel(&self) -> Option<FuelType> {
        match self {
            CarType::Cargo => None,
            CarType::DieselTender => Some(FuelType::Diesel),
            CarType::BatteryTender => Some(FuelType::Electricity),
            CarType::HydrogenTender => Some(FuelType::Hydrogen),
            CarType::BiodieselTender => Some(FuelType::Biodiesel),
        }
    }
}

impl fmt::Display for PowerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            PowerType::Diesel => "diesel",
            PowerType::Electric => "electric",
            PowerType::Biodiesel => "biodiesel",
            PowerType::DieselElectric => "diesel-electric",
            PowerType::DieselHybrid => "diesel hybrid",
            PowerType::HydrogenHybrid => "hydrogen hybrid",
            PowerType::BiodieselHybrid => "biodiesel hybrid",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            FuelType::Diesel => "diesel (L)",
            FuelType::Biodiesel => "biodiesel (L)",
            FuelType::Hydrogen => "hydrogen (L)",
            FuelType::Electricity => "electricity (kWh)",
        };
        write!(f, "{}", s)
    }
}

#[test]
fn test_tender_mapping() {
    assert_eq!(PowerType::from_code(3).unwrap().tender(), CarType::DieselTender);
    assert_eq!(PowerType::from_code(5).unwrap().tender(), CarType::HydrogenTender);
    assert!(PowerType::from_code(7).is_err());
    assert!(CarType::from_code(2).unwrap().is_rechargeable());
    assert!(!CarType::Cargo.is_tender());
}

#[test]
fn test_car_types_key_ordered_maps() {
    use std::collections::BTreeMap;
    let mut tenders = BTreeMap::new();
    tenders.entry(CarType::BiodieselTender).or_insert_with(Vec::new).push(1);
    tenders.entry(CarType::DieselTender).or_insert_with(Vec::new).push(0);
    tenders.entry(CarType::DieselTender).or_insert_with(Vec::new).push(2);
    let keys: Vec<CarType> = tenders.keys().cloned().collect();
    assert_eq!(keys, vec![CarType::DieselTender, CarType::BiodieselTender]);
    assert_eq!(tenders[&CarType::DieselTender], vec![0, 2]);
}
