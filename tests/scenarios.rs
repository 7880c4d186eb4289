use loop_moments::{
    get_recurrences, DifferentialResolver, Monomial, NameAllocator, Program, RatFunc,
    RecurrenceConfig, RecurrenceSolver, Resolver, Solution, SolverConfig, SolverKind,
};

fn solve(program: &Program, goal: &Monomial, config: SolverConfig) -> (Solution, SolverKind) {
    let mut resolver = Resolver::new(program);
    let recurrences =
        get_recurrences(&mut resolver, goal, &RecurrenceConfig::default()).expect("closure");
    let mut solver = RecurrenceSolver::new(&recurrences, config).expect("solver");
    let solution = solver.get(goal).expect("solution");
    (solution, solver.kind())
}

fn exact_values(solution: &Solution, count: u64) -> Vec<RatFunc> {
    let form = solution.exact().expect("exact closed form");
    (0..count).map(|n| form.value_at(n)).collect()
}

#[test]
fn halving_approaches_two() {
    let program = Program::builder()
        .init("x", "0")
        .and_then(|b| b.assign("x", "1/2*x + 1"))
        .and_then(|b| b.build())
        .expect("program");
    let (solution, kind) = solve(&program, &Monomial::var("x"), SolverConfig::default());
    assert_eq!(kind, SolverKind::Acyclic);
    assert_eq!(solution.threshold(), 0);
    assert_eq!(
        exact_values(&solution, 3),
        vec![RatFunc::integer(0), RatFunc::integer(1), RatFunc::ratio(3, 2)]
    );
    for n in 0..20 {
        let expected = 2.0 - 2.0 * 0.5f64.powi(n as i32);
        assert!((solution.value_at(n).unwrap() - expected).abs() < 1e-12);
    }
}

#[test]
fn swap_alternates_between_zero_and_one() {
    let program = Program::builder()
        .init("x", "1")
        .and_then(|b| b.init("y", "0"))
        .and_then(|b| b.assign("t", "x"))
        .and_then(|b| b.assign("x", "y"))
        .and_then(|b| b.assign("y", "t"))
        .and_then(|b| b.build())
        .expect("program");
    let x = Monomial::var("x");
    let y = Monomial::var("y");

    let mut resolver = Resolver::new(&program);
    let recurrences =
        get_recurrences(&mut resolver, &x, &RecurrenceConfig::default()).expect("closure");
    assert_eq!(recurrences.len(), 2);
    assert!(!recurrences.is_acyclic());

    let mut solver = RecurrenceSolver::new(&recurrences, SolverConfig::default()).expect("solver");
    assert_eq!(solver.kind(), SolverKind::Cyclic);
    assert!(solver.is_exact());
    let xs = exact_values(&solver.get(&x).unwrap(), 5);
    let ys = exact_values(&solver.get(&y).unwrap(), 5);
    for n in 0..5 {
        let even = n % 2 == 0;
        assert_eq!(xs[n], RatFunc::integer(i64::from(even)), "x({n})");
        assert_eq!(ys[n], RatFunc::integer(i64::from(!even)), "y({n})");
    }
}

#[test]
fn chain_sums_to_triangular_numbers() {
    let program = Program::builder()
        .assign("x", "x + 1")
        .and_then(|b| b.assign("y", "x + y"))
        .and_then(|b| b.build())
        .expect("program");
    // y reads the updated x, so y(n+1) = y(n) + x(n) + 1.
    let (y, kind) = solve(&program, &Monomial::var("y"), SolverConfig::default());
    assert_eq!(kind, SolverKind::Acyclic);
    for (n, value) in exact_values(&y, 10).into_iter().enumerate() {
        let n = n as i64;
        assert_eq!(value, RatFunc::integer(n * (n + 1) / 2), "y({n})");
    }
}

#[test]
fn chain_reading_the_previous_state() {
    let program = Program::builder()
        .assign("y", "x + y")
        .and_then(|b| b.assign("x", "x + 1"))
        .and_then(|b| b.build())
        .expect("program");
    let (x, _) = solve(&program, &Monomial::var("x"), SolverConfig::default());
    let (y, _) = solve(&program, &Monomial::var("y"), SolverConfig::default());
    for n in 0..10u64 {
        let m = n as i64;
        assert_eq!(x.exact().unwrap().value_at(n), RatFunc::integer(m));
        assert_eq!(y.exact().unwrap().value_at(n), RatFunc::integer(m * (m - 1) / 2));
    }
}

#[test]
fn sensitivity_matches_derivative_of_closed_form() {
    let program = Program::builder()
        .parameter("p")
        .init("x", "0")
        .and_then(|b| b.assign("x", "p*x + 1"))
        .and_then(|b| b.build())
        .expect("program");
    let x = Monomial::var("x");

    let (direct, _) = solve(&program, &x, SolverConfig::default());
    let differentiated = direct.derivative("p").expect("exact derivative");

    let mut names = NameAllocator::default();
    let mut resolver = DifferentialResolver::new(&program, "p", &mut names).expect("resolver");
    let goal = resolver.tagged(&x);
    let recurrences =
        get_recurrences(&mut resolver, &goal, &RecurrenceConfig::default()).expect("closure");
    let mut solver = RecurrenceSolver::new(&recurrences, SolverConfig::default()).expect("solver");
    let sensitivity = solver.get(&goal).expect("solution");

    for p in [-2.0, 1.0 / 3.0, 0.5, 1.5, 3.0] {
        let params = |name: &str| (name == "p").then_some(p);
        for n in 0..8 {
            let lhs = differentiated.evaluate(n, &params).unwrap();
            let rhs = sensitivity.evaluate(n, &params).unwrap();
            // d/dp (1 - p^n)/(1 - p) = Σ_{k<n} k·p^{k-1}
            let expected: f64 = (1..n).map(|k| k as f64 * p.powi(k as i32 - 1)).sum();
            assert!((lhs - rhs).abs() <= 1e-9 * (1.0 + rhs.abs()), "p = {p}, n = {n}");
            assert!((rhs - expected).abs() <= 1e-9 * (1.0 + expected.abs()), "p = {p}, n = {n}");
        }
    }
}

#[test]
fn sensitivity_through_initial_value_and_bernoulli_draw() {
    let program = Program::builder()
        .parameter("p")
        .init("x", "p")
        .and_then(|b| b.sample("b", "Bernoulli", &["p"]))
        .and_then(|b| b.assign("x", "x + b"))
        .and_then(|b| b.build())
        .expect("program");

    let mut names = NameAllocator::default();
    let mut resolver = DifferentialResolver::new(&program, "p", &mut names).expect("resolver");
    let mean = resolver.tagged(&Monomial::var("x"));
    let second = resolver.tagged(&Monomial::power("x", 2));
    let config = RecurrenceConfig::default();
    let mean_system = get_recurrences(&mut resolver, &mean, &config).expect("closure");
    let second_system = get_recurrences(&mut resolver, &second, &config).expect("closure");
    let mut mean_solver =
        RecurrenceSolver::new(&mean_system, SolverConfig::default()).expect("solver");
    let mut second_solver =
        RecurrenceSolver::new(&second_system, SolverConfig::default()).expect("solver");
    let d_mean = mean_solver.get(&mean).expect("solution");
    let d_second = second_solver.get(&second).expect("solution");

    for p in [0.2, 0.5, 0.9] {
        let params = |name: &str| (name == "p").then_some(p);
        for n in 0..8u64 {
            let m = n as f64;
            // E[x] = p(1 + n), E[x²] = n·p(1 - p) + p²(1 + n)²
            let expected_mean = 1.0 + m;
            let expected_second = m * (1.0 - 2.0 * p) + 2.0 * p * (1.0 + m).powi(2);
            let mean_value = d_mean.evaluate(n, &params).unwrap();
            let second_value = d_second.evaluate(n, &params).unwrap();
            assert!((mean_value - expected_mean).abs() < 1e-9, "p = {p}, n = {n}");
            assert!((second_value - expected_second).abs() < 1e-9, "p = {p}, n = {n}");
        }
    }
}

#[test]
fn negated_square_keeps_its_sign() {
    let program = Program::builder()
        .init("y", "3")
        .and_then(|b| b.assign("x", "-y^2"))
        .and_then(|b| b.build())
        .expect("program");
    let (x, _) = solve(&program, &Monomial::var("x"), SolverConfig::default());
    let values = exact_values(&x, 4);
    assert_eq!(values[0], RatFunc::integer(0));
    for value in &values[1..] {
        assert_eq!(value, &RatFunc::integer(-9));
    }
}
