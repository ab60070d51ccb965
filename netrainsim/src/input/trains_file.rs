//! Trains file: a free-text line, a line with the train count, then one
//! tab-separated train per line:
//!
//! `id  path  startTime  friction  locomotives  cars  [optimize]`
//!
//! The path is a comma separated list of node ids. Vehicle groups are
//! separated by `;` and their fields by `,`:
//!
//! * locomotives: `count,power,efficiency,axles,drag,area,length,weight,type`
//! * cars: `count,axles,drag,area,length,gross,tare[,type]`

use regex::Regex;

use super::ParseError;
use super::records::{CarSpec, LocomotiveSpec, TrainRecord};

const TRAINS: &str = "trains";

fn num<T: std::str::FromStr>(s: &str, line: usize) -> Result<T, ParseError> {
    s.trim().parse::<T>().map_err(|_e| ParseError::NumberError(TRAINS, line))
}

fn groups(s: &str) -> impl Iterator<Item = Vec<&str>> {
    s.split(';')
        .filter(|g| !g.trim().is_empty())
        .map(|g| g.split(',').map(|f| f.trim()).collect())
}

fn locomotive(fields: &[&str], line: usize) -> Result<LocomotiveSpec, ParseError> {
    if fields.len() != 9 {
        return Err(ParseError::Unrecognized(TRAINS, line, fields.join(",")));
    }
    Ok(LocomotiveSpec {
        count: num(fields[0], line)?,
        power: num(fields[1], line)?,
        transmission_efficiency: num(fields[2], line)?,
        axles: num(fields[3], line)?,
        drag_coef: num(fields[4], line)?,
        frontal_area: num(fields[5], line)?,
        length: num(fields[6], line)?,
        gross_weight: num(fields[7], line)?,
        power_type: num(fields[8], line)?,
    })
}

fn car(fields: &[&str], line: usize) -> Result<CarSpec, ParseError> {
    if fields.len() != 7 && fields.len() != 8 {
        return Err(ParseError::Unrecognized(TRAINS, line, fields.join(",")));
    }
    Ok(CarSpec {
        count: num(fields[0], line)?,
        axles: num(fields[1], line)?,
        drag_coef: num(fields[2], line)?,
        frontal_area: num(fields[3], line)?,
        length: num(fields[4], line)?,
        gross_weight: num(fields[5], line)?,
        tare_weight: num(fields[6], line)?,
        car_type: match fields.get(7) {
            Some(t) => num(t, line)?,
            None => 0,
        },
    })
}

pub fn parse_trains(input: &str) -> Result<Vec<TrainRecord>, ParseError> {
    let train_re = Regex::new(r"^\s*([^\t]+?)\t([-\d,\s]+?)\t([-+\d\.eE]+)\t([-+\d\.eE]+)\t([^\t]+?)\t([^\t]*?)(?:\t(\w+))?\s*$")
        .map_err(|e| ParseError::RegexError(format!("{:?}", e)))?;

    let mut lines = input.lines().enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());
    lines.next().ok_or(ParseError::MissingHeader(TRAINS))?;
    lines.next().ok_or(ParseError::MissingHeader(TRAINS))?;

    let mut trains = Vec::new();
    for (lineno, line) in lines {
        let g = train_re.captures(line)
            .ok_or_else(|| ParseError::Unrecognized(TRAINS, lineno, line.to_string()))?;
        let path = g[2].split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| num(s, lineno))
            .collect::<Result<Vec<i64>, _>>()?;
        let locomotives = groups(&g[5])
            .map(|f| locomotive(&f, lineno))
            .collect::<Result<Vec<_>, _>>()?;
        let cars = groups(&g[6])
            .map(|f| car(&f, lineno))
            .collect::<Result<Vec<_>, _>>()?;
        let optimize = match g.get(7).map(|m| m.as_str().to_lowercase()) {
            None => false,
            Some(ref s) if s == "1" || s == "true" => true,
            Some(ref s) if s == "0" || s == "false" => false,
            Some(s) => return Err(ParseError::Unrecognized(TRAINS, lineno, s)),
        };
        trains.push(TrainRecord {
            id: g[1].trim().to_string(),
            path,
            start_time: num(&g[3], lineno)?,
            friction: num(&g[4], lineno)?,
            locomotives,
            cars,
            optimize,
        });
    }
    Ok(trains)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_with_groups() {
        let text = "trains\n1\n\
                    T1\t1,2,3\t0\t0.9\t2,3000,0.85,6,0.0055,15,22,200,0\t10,4,0.0055,10,20,100,25;1,4,0.0055,10,20,30,30,1\n";
        let trains = parse_trains(text).unwrap();
        assert_eq!(trains.len(), 1);
        let t = &trains[0];
        assert_eq!(t.id, "T1");
        assert_eq!(t.path, vec![1, 2, 3]);
        assert_eq!(t.friction, 0.9);
        assert_eq!(t.locomotives[0].count, 2);
        assert_eq!(t.locomotives[0].power, 3000.0);
        assert_eq!(t.cars.len(), 2);
        assert_eq!(t.cars[0].car_type, 0);
        assert_eq!(t.cars[1].car_type, 1);
        assert!(!t.optimize);
    }

    #[test]
    fn optimize_flag_and_bad_groups() {
        let ok = "t\n1\nA\t1,2\t5\t0.5\t1,3000,0.85,6,0.0055,15,22,200,0\t\t1\n";
        let trains = parse_trains(ok).unwrap();
        assert!(trains[0].optimize);
        assert!(trains[0].cars.is_empty());
        let bad = "t\n1\nA\t1,2\t5\t0.5\t1,3000\t\n";
        assert!(parse_trains(bad).is_err());
    }
}
