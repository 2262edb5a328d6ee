/*
 * Property Binding Tests
 *
 * Covers the bind/unbind lifecycle for each mode, one-way coalescing through
 * the flush queue, the two-way echo path, and origin dispatch.
 */

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use aster_runtime::{
        Binding, BindingMode, ExpressionParser, Obj, ObserverLocator, PropertyBinding, Scope,
        Value,
    };

    struct Fixture {
        source: Obj,
        target: Obj,
        locator: Rc<ObserverLocator>,
        scope: Scope,
    }

    fn fixture(initial: Value) -> Fixture {
        let source = Obj::from_pairs(vec![("v", initial)]);
        let target = Obj::new();
        Fixture {
            scope: Scope::new(Value::Object(source.clone())),
            source,
            target,
            locator: Rc::new(ObserverLocator::new()),
        }
    }

    fn binding_for(f: &Fixture, mode: BindingMode) -> Rc<PropertyBinding> {
        let parser = ExpressionParser::new();
        let ast = parser.parse_binding("v").unwrap();
        PropertyBinding::new(ast, f.target.clone(), "value", mode, f.locator.clone())
    }

    #[test]
    fn bind_writes_the_initial_value() {
        for mode in [BindingMode::OneTime, BindingMode::OneWay, BindingMode::TwoWay] {
            let f = fixture(Value::string("initial"));
            let binding = binding_for(&f, mode);
            binding.bind(f.scope.clone()).unwrap();
            assert!(binding.is_bound());
            assert_eq!(f.target.get("value"), Value::string("initial"));
        }
    }

    #[test]
    fn one_time_never_updates_after_bind() {
        let f = fixture(Value::Number(1.0));
        let binding = binding_for(&f, BindingMode::OneTime);
        binding.bind(f.scope.clone()).unwrap();

        f.source.set("v", Value::Number(2.0));
        f.locator.flush_changes();
        assert_eq!(f.target.get("value"), Value::Number(1.0));
    }

    #[test]
    fn one_way_updates_the_target_on_flush() {
        let f = fixture(Value::Number(1.0));
        let binding = binding_for(&f, BindingMode::OneWay);
        binding.bind(f.scope.clone()).unwrap();

        f.source.set("v", Value::Number(2.0));
        assert_eq!(
            f.target.get("value"),
            Value::Number(1.0),
            "nothing moves before the flush"
        );

        f.locator.flush_changes();
        assert_eq!(f.target.get("value"), Value::Number(2.0));
    }

    #[test]
    fn one_way_coalesces_intermediate_values() {
        let f = fixture(Value::Number(0.0));
        let binding = binding_for(&f, BindingMode::OneWay);
        binding.bind(f.scope.clone()).unwrap();

        f.source.set("v", Value::Number(1.0));
        f.source.set("v", Value::Number(2.0));
        f.source.set("v", Value::Number(3.0));
        f.locator.flush_changes();

        assert_eq!(f.target.get("value"), Value::Number(3.0));
    }

    #[test]
    fn two_way_updates_the_target_synchronously() {
        let f = fixture(Value::Number(1.0));
        let binding = binding_for(&f, BindingMode::TwoWay);
        binding.bind(f.scope.clone()).unwrap();

        f.source.set("v", Value::Number(2.0));
        assert_eq!(f.target.get("value"), Value::Number(2.0));
    }

    #[test]
    fn two_way_routes_the_target_event_back_to_the_source() {
        let f = fixture(Value::string("before"));
        let binding = binding_for(&f, BindingMode::TwoWay);
        binding.bind(f.scope.clone()).unwrap();

        f.target.set("value", Value::string("after"));
        f.target
            .dispatch_event(&aster_runtime::Event::new("change", Value::Undefined));

        assert_eq!(f.source.get("v"), Value::string("after"));
        assert_eq!(f.target.get("value"), Value::string("after"));
    }

    #[test]
    fn two_way_round_trip_settles_without_echo() {
        let f = fixture(Value::Number(1.0));
        let binding = binding_for(&f, BindingMode::TwoWay);
        binding.bind(f.scope.clone()).unwrap();

        f.target.set("value", Value::Number(5.0));
        f.target
            .dispatch_event(&aster_runtime::Event::new("change", Value::Undefined));
        f.locator.flush_changes();

        assert_eq!(f.source.get("v"), Value::Number(5.0));
        assert_eq!(f.target.get("value"), Value::Number(5.0));
    }

    #[test]
    fn two_way_target_event_is_configurable() {
        let f = fixture(Value::string("x"));
        let binding = binding_for(&f, BindingMode::TwoWay);
        binding.set_target_event("input");
        binding.bind(f.scope.clone()).unwrap();

        f.target.set("value", Value::string("typed"));
        f.target
            .dispatch_event(&aster_runtime::Event::new("change", Value::Undefined));
        assert_eq!(f.source.get("v"), Value::string("x"), "wrong event is ignored");

        f.target
            .dispatch_event(&aster_runtime::Event::new("input", Value::Undefined));
        assert_eq!(f.source.get("v"), Value::string("typed"));
    }

    #[test]
    fn unbind_stops_propagation_in_both_directions() {
        let f = fixture(Value::Number(1.0));
        let binding = binding_for(&f, BindingMode::TwoWay);
        binding.bind(f.scope.clone()).unwrap();
        binding.unbind();
        assert!(!binding.is_bound());

        f.source.set("v", Value::Number(2.0));
        f.locator.flush_changes();
        assert_eq!(f.target.get("value"), Value::Number(1.0));

        f.target.set("value", Value::Number(9.0));
        f.target
            .dispatch_event(&aster_runtime::Event::new("change", Value::Undefined));
        assert_eq!(f.source.get("v"), Value::Number(2.0));
    }

    #[test]
    fn double_unbind_is_a_no_op() {
        let f = fixture(Value::Number(1.0));
        let binding = binding_for(&f, BindingMode::OneWay);
        binding.bind(f.scope.clone()).unwrap();
        binding.unbind();
        binding.unbind();
        assert!(!binding.is_bound());
    }

    #[test]
    fn rebinding_replaces_the_scope() {
        let f = fixture(Value::string("first"));
        let binding = binding_for(&f, BindingMode::OneWay);
        binding.bind(f.scope.clone()).unwrap();

        let other_source = Obj::from_pairs(vec![("v", Value::string("second"))]);
        let other_scope = Scope::new(Value::Object(other_source.clone()));
        binding.bind(other_scope).unwrap();
        assert_eq!(f.target.get("value"), Value::string("second"));

        // The first scope's source is no longer connected.
        f.source.set("v", Value::string("stale"));
        f.locator.flush_changes();
        assert_eq!(f.target.get("value"), Value::string("second"));

        other_source.set("v", Value::string("fresh"));
        f.locator.flush_changes();
        assert_eq!(f.target.get("value"), Value::string("fresh"));
    }

    #[test]
    fn bind_surfaces_evaluation_errors_and_stays_unbound() {
        let f = fixture(Value::Number(1.0));
        let parser = ExpressionParser::new();
        let ast = parser.parse_binding("v()").unwrap();
        let binding = PropertyBinding::new(
            ast,
            f.target.clone(),
            "value",
            BindingMode::OneWay,
            f.locator.clone(),
        );

        assert!(binding.bind(f.scope.clone()).is_err());
        assert!(!binding.is_bound());
        assert_eq!(f.target.get("value"), Value::Undefined);
    }

    #[test]
    fn composite_expressions_react_to_every_operand() {
        let source = Obj::from_pairs(vec![
            ("first", Value::string("Jane")),
            ("last", Value::string("Doe")),
        ]);
        let scope = Scope::new(Value::Object(source.clone()));
        let target = Obj::new();
        let locator = Rc::new(ObserverLocator::new());
        let parser = ExpressionParser::new();
        let ast = parser.parse_binding("first + ' ' + last").unwrap();
        let binding =
            PropertyBinding::new(ast, target.clone(), "value", BindingMode::OneWay, locator.clone());
        binding.bind(scope).unwrap();
        assert_eq!(target.get("value"), Value::string("Jane Doe"));

        source.set("last", Value::string("Smith"));
        locator.flush_changes();
        assert_eq!(target.get("value"), Value::string("Jane Smith"));
    }

    #[test]
    fn member_chains_follow_replaced_intermediates() {
        let first_user = Obj::from_pairs(vec![("name", Value::string("a"))]);
        let source = Obj::from_pairs(vec![("user", Value::Object(first_user))]);
        let scope = Scope::new(Value::Object(source.clone()));
        let target = Obj::new();
        let locator = Rc::new(ObserverLocator::new());
        let parser = ExpressionParser::new();
        let ast = parser.parse_binding("user.name").unwrap();
        let binding =
            PropertyBinding::new(ast, target.clone(), "value", BindingMode::OneWay, locator.clone());
        binding.bind(scope).unwrap();
        assert_eq!(target.get("value"), Value::string("a"));

        let second_user = Obj::from_pairs(vec![("name", Value::string("b"))]);
        source.set("user", Value::Object(second_user.clone()));
        locator.flush_changes();
        assert_eq!(target.get("value"), Value::string("b"));

        // The binding now observes the replacement object's property.
        second_user.set("name", Value::string("c"));
        locator.flush_changes();
        assert_eq!(target.get("value"), Value::string("c"));
    }
}
