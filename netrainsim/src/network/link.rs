use std::collections::BTreeSet;
use crate::vehicles::CatenaryTally;

#[derive(Clone, Debug)]
pub struct Link {
    pub sim_id: usize,
    pub user_id: i64,
    pub from: usize,
    pub to: usize,
    pub length: f64,
    pub free_flow_speed: f64,
    pub signal_id: i64,
    grade: f64,
    pub curvature: f64,
    pub directions: u32,
    pub speed_variation: f64,
    /// Present when the link is electrified.
    pub catenary: Option<CatenaryTally>,
    pub region: String,
    /// Travel time, squared on links shared by both directions.
    pub cost: f64,
    /// Trains whose body currently spans this link.
    pub trains: BTreeSet<usize>,
}

impl Link {
    pub fn new(sim_id: usize, user_id: i64, from: usize, to: usize, length: f64,
               free_flow_speed: f64, grade: f64, curvature: f64, directions: u32) -> Link {
        let time = length / free_flow_speed;
        let cost = if directions == 1 { time } else { time * time };
        Link {
            sim_id,
            user_id,
            from,
            to,
            length,
            free_flow_speed,
            signal_id: 0,
            grade,
            curvature,
            directions,
            speed_variation: 0.0,
            catenary: None,
            region: "ND Region".to_string(),
            cost,
            trains: BTreeSet::new(),
        }
    }

    pub fn is_one_way(&self) -> bool {
        self.directions == 1
    }

    pub fn has_catenary(&self) -> bool {
        self.catenary.is_some()
    }

    /// Grade as experienced by a train entering the link at `node`.
    pub fn grade_from(&self, node: usize) -> f64 {
        if node == self.from { self.grade } else { -self.grade }
    }
}

#[test]
fn test_grade_sign_follows_direction() {
    let l = Link::new(0, 1, 3, 4, 100.0, 10.0, 0.5, 0.0, 2);
    assert_eq!(l.grade_from(3), 0.5);
    assert_eq!(l.grade_from(4), -0.5);
    assert_eq!(l.cost, 100.0);
    let one_way = Link::new(1, 2, 3, 4, 100.0, 10.0, 0.0, 0.0, 1);
    assert_eq!(one_way.cost, 10.0);
}
