/// Fuel tank of a locomotive or tender car. Quantities are in liters.
#[derive(Clone, Debug)]
pub struct Tank {
    max_capacity: f64,
    initial_capacity: f64,
    current_capacity: f64,
    state_of_capacity: f64,
    depth_of_discharge: f64,
    pub cum_consumed: f64,
}

impl Tank {
    pub fn new(max_capacity: f64, initial_ratio: f64, depth_of_discharge: f64) -> Tank {
        let initial = max_capacity * initial_ratio;
        Tank {
            max_capacity,
            initial_capacity: initial,
            current_capacity: initial,
            state_of_capacity: if max_capacity > 0.0 { initial_ratio } else { 0.0 },
            depth_of_discharge,
            cum_consumed: 0.0,
        }
    }

    pub fn none() -> Tank {
        Tank::new(0.0, 0.0, 1.0)
    }

    /// A tank holding exactly `liters`, always fully drainable.
    pub fn with_fuel(liters: f64) -> Tank {
        Tank::new(liters, 1.0, 1.0)
    }

    pub fn max_capacity(&self) -> f64 { self.max_capacity }
    pub fn initial_capacity(&self) -> f64 { self.initial_capacity }
    pub fn current_capacity(&self) -> f64 { self.current_capacity }
    pub fn state_of_capacity(&self) -> f64 { self.state_of_capacity }

    pub fn has_fuel(&self) -> bool {
        self.max_capacity > 0.0 && self.state_of_capacity > 1.0 - self.depth_of_discharge
    }

    pub fn is_drainable(&self, liters: f64) -> bool {
        self.max_capacity > 0.0 && liters <= self.current_capacity && self.has_fuel()
    }

    pub fn consume(&mut self, liters: f64) {
        self.current_capacity -= liters;
        self.cum_consumed += liters;
        self.state_of_capacity = self.current_capacity / self.max_capacity;
    }

    pub fn reset(&mut self) {
        self.current_capacity = self.initial_capacity;
        self.state_of_capacity = if self.max_capacity > 0.0 {
            self.initial_capacity / self.max_capacity
        } else {
            0.0
        };
        self.cum_consumed = 0.0;
    }
}

#[test]
fn test_tank_drains_to_depth_of_discharge() {
    let mut t = Tank::new(100.0, 0.9, 0.8);
    assert!(t.is_drainable(60.0));
    t.consume(60.0);
    assert!((t.state_of_capacity() - 0.3).abs() < 1e-9);
    assert!(t.has_fuel());
    t.consume(15.0);
    assert!(!t.has_fuel());
    assert!(!t.is_drainable(1.0));
    t.reset();
    assert_eq!(t.current_capacity(), 90.0);
}
