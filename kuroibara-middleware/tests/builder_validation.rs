use kuroibara_middleware::SourceBuilder;
use kuroibara_mock::MockSourceBuilder;

#[test]
fn empty_stack_validates_and_builds() {
    let mock = MockSourceBuilder::new("mangasource").build();
    let built = SourceBuilder::new(mock).build();
    assert!(built.is_ok());
}

#[test]
fn to_stack_lists_layers_outermost_first_plus_raw_source() {
    use std::sync::Arc;
    use std::time::Duration;

    use kuroibara_rate::RateController;

    let mock = MockSourceBuilder::new("mangasource").build();
    let controller = Arc::new(RateController::new());
    let builder = SourceBuilder::new(mock).with_rate_limit(controller, Duration::from_secs(1));

    let stack = builder.to_stack();
    let names: Vec<&str> = stack.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["rate_limit", "raw_source"]);
}

#[test]
fn replacing_a_layer_by_name_keeps_a_single_copy() {
    use std::sync::Arc;
    use std::time::Duration;

    use kuroibara_rate::RateController;

    let mock = MockSourceBuilder::new("mangasource").build();
    let controller = Arc::new(RateController::new());
    let builder = SourceBuilder::new(mock)
        .with_rate_limit(Arc::clone(&controller), Duration::from_secs(1))
        .with_rate_limit(controller, Duration::from_secs(5));

    let stack = builder.to_stack();
    let rate_limit_layers = stack.layers.iter().filter(|l| l.name == "rate_limit").count();
    assert_eq!(rate_limit_layers, 1);
}
