use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const TRAJECTORY_HEADER: &str = "TrainNo,TStep_s,TravelledDistance_m,Acceleration_mps2,\
Speed_mps,LinkMaxSpeed_mps,EnergyConsumption_KWH,DelayTimeToEach_s,DelayTime_s,Stoppings,\
tractiveForce_N,ResistanceForces_N,CurrentUsedTractivePower_kw,GradeAtTip_Perc,\
CurvatureAtTip_Perc,FirstLocoNotchPosition";

/// State of one train at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryRow {
    pub train: String,
    pub time: f64,
    pub travelled: f64,
    pub acceleration: f64,
    pub speed: f64,
    pub link_max_speed: f64,
    pub energy: f64,
    pub max_delay: f64,
    pub delay: f64,
    pub stoppings: f64,
    pub tractive_force: f64,
    pub resistance: f64,
    pub used_power: f64,
    pub grade: f64,
    pub curvature: f64,
    pub notch: u32,
}

impl TrajectoryRow {
    pub fn write_csv<W: Write>(&self, f: &mut W) -> io::Result<()> {
        writeln!(f, "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                 self.train, self.time, self.travelled, self.acceleration, self.speed,
                 self.link_max_speed, self.energy, self.max_delay, self.delay, self.stoppings,
                 self.tractive_force, self.resistance, self.used_power, self.grade,
                 self.curvature, self.notch)
    }
}

/// Trajectory CSV export, header written on creation.
pub struct TrajectoryWriter<W: Write> {
    out: W,
}

impl TrajectoryWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        TrajectoryWriter::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> TrajectoryWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{}", TRAJECTORY_HEADER)?;
        Ok(TrajectoryWriter { out })
    }

    pub fn write(&mut self, row: &TrajectoryRow) -> io::Result<()> {
        row.write_csv(&mut self.out)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_header() {
        let mut w = TrajectoryWriter::new(Vec::new()).unwrap();
        w.write(&TrajectoryRow {
            train: "t".to_string(), time: 1.0, travelled: 2.5, acceleration: 0.5, speed: 1.0,
            link_max_speed: 20.0, energy: 0.1, max_delay: 0.9, delay: 0.95, stoppings: 0.0,
            tractive_force: 100.0, resistance: 50.0, used_power: 10.0, grade: 0.0,
            curvature: 0.0, notch: 1,
        }).unwrap();
        let text = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split(',').count(), 16);
        assert_eq!(lines[1], "t,1,2.5,0.5,1,20,0.1,0.9,0.95,0,100,50,10,0,0,1");
    }
}
