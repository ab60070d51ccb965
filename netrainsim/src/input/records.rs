/// One row of the nodes file.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub user_id: i64,
    pub x: f64,
    pub y: f64,
    pub description: String,
    pub x_scale: f64,
    pub y_scale: f64,
}

/// One row of the links file.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkRecord {
    pub user_id: i64,
    pub from: i64,
    pub to: i64,
    /// Zero or negative means the length is taken from the node coordinates.
    pub length: f64,
    pub free_flow_speed: f64,
    /// 0 for none, 10001 marks the end node as a depot, anything else
    /// places a signal.
    pub signal_id: i64,
    pub grade: f64,
    pub curvature: f64,
    /// 1 for one-way links, anything else is bidirectional.
    pub directions: u32,
    pub speed_variation: f64,
    pub has_catenary: bool,
    pub region: String,
    pub length_scale: f64,
    pub speed_scale: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocomotiveSpec {
    pub count: u32,
    /// kW.
    pub power: f64,
    pub transmission_efficiency: f64,
    pub axles: u32,
    pub drag_coef: f64,
    pub frontal_area: f64,
    pub length: f64,
    /// Tons.
    pub gross_weight: f64,
    pub power_type: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CarSpec {
    pub count: u32,
    pub axles: u32,
    pub drag_coef: f64,
    pub frontal_area: f64,
    pub length: f64,
    pub gross_weight: f64,
    pub tare_weight: f64,
    pub car_type: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainRecord {
    pub id: String,
    /// Node user ids.
    pub path: Vec<i64>,
    pub start_time: f64,
    pub friction: f64,
    pub locomotives: Vec<LocomotiveSpec>,
    pub cars: Vec<CarSpec>,
    pub optimize: bool,
}

impl NodeRecord {
    pub fn new(user_id: i64, x: f64, y: f64) -> NodeRecord {
        NodeRecord { user_id, x, y, description: String::new(), x_scale: 1.0, y_scale: 1.0 }
    }
}

impl LinkRecord {
    /// A bidirectional link without signal, grade or catenary.
    pub fn new(user_id: i64, from: i64, to: i64, length: f64, free_flow_speed: f64) -> LinkRecord {
        LinkRecord {
            user_id,
            from,
            to,
            length,
            free_flow_speed,
            signal_id: 0,
            grade: 0.0,
            curvature: 0.0,
            directions: 2,
            speed_variation: 0.0,
            has_catenary: false,
            region: "ND Region".to_string(),
            length_scale: 1.0,
            speed_scale: 1.0,
        }
    }
}
