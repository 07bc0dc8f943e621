//! Unit tests for ms-core primitives.

#[cfg(test)]
mod ids {
    use crate::{AgentId, NodeId, RequestId, TripId};

    #[test]
    fn index_roundtrip() {
        let id = AgentId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(AgentId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(AgentId::INVALID.0, u32::MAX);
        assert_eq!(NodeId::default(), NodeId::INVALID);
    }

    #[test]
    fn display() {
        assert_eq!(RequestId(7).to_string(), "RequestId(7)");
        assert_eq!(TripId::from("op_T3").to_string(), "op_T3");
    }
}

#[cfg(test)]
mod time {
    use crate::{CoreError, Delay, SimConfig, Tick};

    #[test]
    fn tick_arithmetic() {
        let t = Tick(100);
        assert_eq!(t + 20, Tick(120));
        assert_eq!(Tick(120) - t, 20);
        assert_eq!(t.since(Tick(150)), 0);
        assert_eq!(t.signed_since(Tick(150)), -50);
    }

    #[test]
    fn delay_rejects_negative_and_fractional() {
        assert!(matches!(Delay::from_secs(-1.0), Err(CoreError::InvalidDuration(_))));
        assert!(matches!(Delay::from_secs(1.5), Err(CoreError::InvalidDuration(_))));
        assert!(matches!(Delay::from_secs(f64::NAN), Err(CoreError::InvalidDuration(_))));
        assert!(Delay::from_signed(-3).is_err());
        assert_eq!(Delay::from_secs(12.0).unwrap(), Delay::Finite(12));
    }

    #[test]
    fn delay_parses_inf() {
        assert_eq!("inf".parse::<Delay>().unwrap(), Delay::Inf);
        assert_eq!(" 30 ".parse::<Delay>().unwrap(), Delay::Finite(30));
        assert!("soon".parse::<Delay>().is_err());
        assert_eq!(Delay::from_secs(f64::INFINITY).unwrap(), Delay::Inf);
    }

    #[test]
    fn inf_resolves_to_limit() {
        assert_eq!(Delay::Inf.resolve(Tick(10), Tick(500)), Tick(500));
        assert_eq!(Delay::secs(5).resolve(Tick(10), Tick(500)), Tick(15));
    }

    #[test]
    fn config_validation() {
        assert!(SimConfig::new(0, 1).validate().is_err());
        assert!(SimConfig::new(86_400, 1).validate().is_ok());
        assert_eq!(SimConfig::new(3_600, 1).end_tick(), Tick(3_600));
    }
}

#[cfg(test)]
mod geo {
    use crate::{GeoPoint, Zone};

    fn square() -> Zone {
        Zone::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn zone_needs_three_vertices() {
        assert!(Zone::new(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)]).is_err());
    }

    #[test]
    fn zone_contains() {
        let zone = square();
        assert!(zone.contains(GeoPoint::new(0.5, 0.5)));
        assert!(!zone.contains(GeoPoint::new(1.5, 0.5)));
        assert!(!zone.contains(GeoPoint::new(0.5, -0.1)));
    }

    #[test]
    fn one_degree_latitude() {
        let d = GeoPoint::new(30.0, -88.0).distance_m(GeoPoint::new(31.0, -88.0));
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }
}

#[cfg(test)]
mod rng {
    use crate::SimRng;

    #[test]
    fn same_seed_same_draws() {
        let mut a = SimRng::new(7);
        let mut b = SimRng::new(7);
        let xs: Vec<u32> = (0..8).map(|_| a.gen_range(0..1000)).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.gen_range(0..1000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn choose_empty_is_none() {
        let mut rng = SimRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
        assert_eq!(rng.choose(&[9]), Some(&9));
    }
}
