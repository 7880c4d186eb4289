use loop_moments::{
    get_recurrences, Assignment, DifferentialResolver, Expr, Monomial, MomentError,
    NameAllocator, Program, RatFunc, RecurrenceConfig, RecurrenceSolver, Resolver, RootMode,
    SolverConfig, SolverKind, StatePoly, TrigFunction,
};

/// x' = x + y, y' = x with x(0) = 1, y(0) = 0.
fn fibonacci() -> Program {
    Program::builder()
        .init("x", "1")
        .and_then(|b| b.assign("t", "x"))
        .and_then(|b| b.assign("x", "x + y"))
        .and_then(|b| b.assign("y", "t"))
        .and_then(|b| b.build())
        .expect("program")
}

/// Quarter turn: x' = -y, y' = x with x(0) = 1, y(0) = 0.
fn rotation() -> Program {
    Program::builder()
        .init("x", "1")
        .and_then(|b| b.assign("t", "x"))
        .and_then(|b| b.assign("x", "-y"))
        .and_then(|b| b.assign("y", "t"))
        .and_then(|b| b.build())
        .expect("program")
}

#[test]
fn squaring_never_closes() {
    let program = Program::builder()
        .init("x", "2")
        .and_then(|b| b.assign("x", "x^2"))
        .and_then(|b| b.build())
        .expect("program");
    let mut resolver = Resolver::new(&program);
    let config = RecurrenceConfig::default().with_max_monomials(16);
    let err = get_recurrences(&mut resolver, &Monomial::var("x"), &config).unwrap_err();
    assert!(matches!(err, MomentError::ClosureLimit { limit: 16 }), "{err}");
}

#[test]
fn monomials_outside_the_closure_are_rejected() {
    let program = fibonacci();
    let mut resolver = Resolver::new(&program);
    let recurrences =
        get_recurrences(&mut resolver, &Monomial::var("x"), &RecurrenceConfig::default())
            .expect("closure");
    let mut solver = RecurrenceSolver::new(&recurrences, SolverConfig::default()).unwrap();
    let err = solver.get(&Monomial::power("x", 2)).unwrap_err();
    assert!(matches!(err, MomentError::UnknownMonomial(_)), "{err}");
}

#[test]
fn irrational_roots_lower_exactness() {
    let program = fibonacci();
    let x = Monomial::var("x");
    let mut resolver = Resolver::new(&program);
    let recurrences =
        get_recurrences(&mut resolver, &x, &RecurrenceConfig::default()).expect("closure");
    let mut solver = RecurrenceSolver::new(&recurrences, SolverConfig::default()).unwrap();
    assert_eq!(solver.kind(), SolverKind::Cyclic);
    assert!(!solver.is_exact());

    let solution = solver.get(&x).unwrap();
    assert!(!solution.is_exact());
    assert!(solution.exact().is_none());
    assert!(matches!(
        solution.derivative("p"),
        Err(MomentError::Unsupported(_))
    ));
    let fib = [1.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0, 55.0, 89.0];
    for (n, expected) in fib.iter().enumerate() {
        assert!((solution.value_at(n as u64).unwrap() - expected).abs() < 1e-6, "n = {n}");
    }
}

#[test]
fn atom_coefficients_fall_back_to_numeric_roots() {
    // x' = cos(1)·y, y' = x with x(0) = 1, y(0) = 0
    let cos_one = RatFunc::atom(&Expr::Cos(Expr::integer(1).boxed()));
    let program = Program::builder()
        .init("x", "1")
        .and_then(|b| b.assign("t", "x"))
        .map(|b| {
            b.statement(
                "x",
                Assignment::Polynomial(StatePoly::term(cos_one, Monomial::var("y"))),
            )
        })
        .and_then(|b| b.assign("y", "t"))
        .and_then(|b| b.build())
        .expect("program");
    let x = Monomial::var("x");
    let mut resolver = Resolver::new(&program);
    let recurrences =
        get_recurrences(&mut resolver, &x, &RecurrenceConfig::default()).expect("closure");
    let mut solver = RecurrenceSolver::new(&recurrences, SolverConfig::default()).unwrap();
    assert!(!solver.is_exact());

    let solution = solver.get(&x).unwrap();
    for n in 0..10u64 {
        let expected = if n % 2 == 0 { 1f64.cos().powi(n as i32 / 2) } else { 0.0 };
        assert!((solution.value_at(n).unwrap() - expected).abs() < 1e-9, "n = {n}");
    }
}

#[test]
fn complex_roots_are_approximated_or_rejected() {
    let program = rotation();
    let x = Monomial::var("x");
    let mut resolver = Resolver::new(&program);
    let recurrences =
        get_recurrences(&mut resolver, &x, &RecurrenceConfig::default()).expect("closure");

    let real_only = SolverConfig::default().with_root_mode(RootMode::NumericReal { epsilon: 1e-9 });
    let err = RecurrenceSolver::new(&recurrences, real_only).unwrap_err();
    assert!(matches!(err, MomentError::RootFinding(_)), "{err}");

    let complex = SolverConfig::default()
        .with_root_mode(RootMode::NumericComplex { epsilon: 1e-9 });
    let mut solver = RecurrenceSolver::new(&recurrences, complex).unwrap();
    let solution = solver.get(&x).unwrap();
    for (n, expected) in [1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0].iter().enumerate() {
        assert!((solution.value_at(n as u64).unwrap() - expected).abs() < 1e-9, "n = {n}");
    }
}

#[test]
fn invalid_programs_are_rejected() {
    let twice = Program::builder()
        .assign("x", "x + 1")
        .and_then(|b| b.assign("x", "2*x"))
        .and_then(|b| b.build());
    assert!(matches!(twice, Err(MomentError::InvalidProgram(_))));

    let assigned_parameter = Program::builder()
        .parameter("p")
        .assign("p", "1")
        .and_then(|b| b.build());
    assert!(matches!(assigned_parameter, Err(MomentError::InvalidProgram(_))));

    assert!(matches!(
        Program::builder().sample("x", "Poisson", &["1"]),
        Err(MomentError::Unsupported(_) | MomentError::InvalidProgram(_))
    ));
    assert!(matches!(
        Program::builder().assign("x", "x +"),
        Err(MomentError::Parse(_))
    ));
}

#[test]
fn sensitivity_through_a_parametric_trig_draw_is_unsupported() {
    let program = Program::builder()
        .parameter("p")
        .trigonometric("c", TrigFunction::Sin, "Normal", &["p", "1"])
        .and_then(|b| b.assign("s", "s + c"))
        .and_then(|b| b.build())
        .expect("program");
    let mut names = NameAllocator::default();
    let err = DifferentialResolver::new(&program, "p", &mut names).unwrap_err();
    assert!(matches!(err, MomentError::Unsupported(_)), "{err}");
}
