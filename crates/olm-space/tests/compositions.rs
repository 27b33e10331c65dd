use olm_core::errors::OlmError;
use olm_space::{
    Axis, BurnupSchedule, CaseSet, CompositionSpec, ExpansionStrategy, StateSpace, StaticParams,
};

fn close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn uox_cases(enrichments: Vec<f64>) -> Result<CaseSet, OlmError> {
    let axes = vec![
        Axis::new("enrichment", enrichments, "wt%")?,
        Axis::new("mod_dens", vec![0.5, 0.7], "g/cc")?,
    ];
    let space = StateSpace::new(axes, ExpansionStrategy::Grid)?;
    let schedule = BurnupSchedule::new(&[0.0, 1000.0], 40.0)?;
    CaseSet::new(space, schedule, None, StaticParams::new())
}

#[test]
fn uox_correlations_follow_enrichment() -> Result<(), OlmError> {
    let set = uox_cases(vec![4.0])?.with_composition(CompositionSpec::UoxVera {
        prefix: String::new(),
    })?;
    let case = set.cases().next().expect("case");
    close(case.composition["u235"], 4.0);
    close(case.composition["u234"], 0.007731 * 4.0_f64.powf(1.0837));
    close(case.composition["u234"], 0.034728664751911255);
    close(case.composition["u236"], 0.0184);
    close(case.composition["u238"], 95.94687133524809);

    let set = uox_cases(vec![3.0])?.with_composition(CompositionSpec::UoxSimple {
        prefix: "fuel.".to_string(),
    })?;
    let case = set.cases().next().expect("case");
    assert_eq!(
        case.composition.keys().collect::<Vec<_>>(),
        vec!["fuel.u234", "fuel.u235", "fuel.u236", "fuel.u238"]
    );
    close(case.composition["fuel.u238"], 97.0);
    assert!(case.composition["fuel.u234"] > 0.0);
    Ok(())
}

#[test]
fn out_of_range_enrichment_is_a_configuration_error() -> Result<(), OlmError> {
    let err = uox_cases(vec![5.0, 12.0])?
        .with_composition(CompositionSpec::UoxVera {
            prefix: String::new(),
        })
        .expect_err("vera stops at 10%");
    assert!(matches!(err, OlmError::Configuration(_)));
    assert_eq!(err.info().code, "composition_out_of_range");
    assert_eq!(err.info().context["value"], "12");
    assert!(err.info().context.contains_key("case"));

    // the same points are fine for the wider correlation
    let set = uox_cases(vec![5.0, 12.0])?.with_composition(CompositionSpec::UoxNuregcr5625 {
        prefix: String::new(),
    })?;
    let last = set.cases().last().expect("case");
    close(last.composition["u234"], 0.0089 * 12.0);

    let err = uox_cases(vec![25.0])?
        .with_composition(CompositionSpec::UoxNuregcr5625 {
            prefix: String::new(),
        })
        .expect_err("above 20%");
    assert_eq!(err.info().code, "composition_out_of_range");
    Ok(())
}

#[test]
fn mox_vector_and_zone_contents() -> Result<(), OlmError> {
    let axes = vec![
        Axis::new("pu239", vec![60.0], "wt%")?,
        Axis::new("pu", vec![8.0], "wt%")?,
    ];
    let space = StateSpace::new(axes, ExpansionStrategy::Grid)?;
    let schedule = BurnupSchedule::new(&[0.0, 1000.0], 40.0)?;
    let spec = CompositionSpec::MoxOrnltm2003_2 {
        pins_zone: [200.0, 40.0, 20.0, 4.0],
        density_fuel: 10.4,
        pins_gd: 0,
        pct_gd: 0.0,
        prefix: String::new(),
    };
    let set = CaseSet::new(space, schedule, None, StaticParams::new())?.with_composition(spec)?;
    let comp = set.cases().next().expect("case").composition;

    close(comp["pu238"], 1.563080000000003);
    close(comp["pu239"], 60.0);
    close(comp["pu240"], 25.634499999999985);
    close(comp["pu241"], 7.389600000000005);
    close(comp["pu242"], 5.413800000000002);
    close(comp["pu"], 8.0);
    close(comp["inner"], 8.394276629570747);
    close(comp["inedge"], 7.5548489666136724);
    close(comp["edge"], 5.708108108108108);
    close(comp["corner"], 4.197138314785374);
    assert!(comp["avg_a_pu"] > 239.0 && comp["avg_a_pu"] < 240.0);
    assert_eq!(set.manifest()[0].composition, comp);
    Ok(())
}

#[test]
fn mox_rejects_missing_axes_and_gadolinia() -> Result<(), OlmError> {
    let spec = CompositionSpec::MoxOrnltm2003_2 {
        pins_zone: [200.0, 40.0, 20.0, 4.0],
        density_fuel: 10.4,
        pins_gd: 0,
        pct_gd: 0.0,
        prefix: String::new(),
    };
    let err = uox_cases(vec![4.0])?
        .with_composition(spec.clone())
        .expect_err("no pu axes");
    assert_eq!(err.info().code, "composition_axis_missing");
    assert_eq!(err.info().context["axis"], "pu239");

    let axes = vec![
        Axis::new("pu239", vec![100.0], "wt%")?,
        Axis::new("pu", vec![8.0], "wt%")?,
    ];
    let space = StateSpace::new(axes, ExpansionStrategy::Grid)?;
    let schedule = BurnupSchedule::new(&[0.0, 1000.0], 40.0)?;
    let set = CaseSet::new(space, schedule, None, StaticParams::new())?;
    let err = set.clone().with_composition(spec).expect_err("pu239 at 100%");
    assert_eq!(err.info().code, "composition_out_of_range");

    let gd = CompositionSpec::MoxOrnltm2003_2 {
        pins_zone: [200.0, 40.0, 20.0, 4.0],
        density_fuel: 10.4,
        pins_gd: 8,
        pct_gd: 5.0,
        prefix: String::new(),
    };
    let err = set.with_composition(gd).expect_err("gd pins");
    assert!(matches!(err, OlmError::Configuration(_)));
    assert_eq!(err.info().code, "composition_gd_unsupported");
    Ok(())
}

#[test]
fn calculator_is_a_tagged_configuration_block() -> Result<(), OlmError> {
    let spec: CompositionSpec = serde_yaml::from_str(
        "type: mox_ornltm2003_2\npins_zone: [200, 40, 20, 4]\n",
    )
    .expect("yaml");
    assert_eq!(spec.id(), "mox_ornltm2003_2");
    assert!(matches!(
        spec,
        CompositionSpec::MoxOrnltm2003_2 { density_fuel, pins_gd: 0, .. } if density_fuel == 10.4
    ));
    assert!(serde_yaml::from_str::<CompositionSpec>("type: uox_magic\n").is_err());

    let plain = uox_cases(vec![4.0])?;
    let case = plain.cases().next().expect("case");
    assert!(case.composition.is_empty());
    assert!(plain.composition().is_none());
    Ok(())
}
