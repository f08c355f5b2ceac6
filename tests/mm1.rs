use approx::assert_relative_eq;
use qnsim::{
    theory::Mm1, units::Rate, Destination, MultiStream, Network, NodeDesc, NodeId, Row,
    RoutingTable, Sampler, Simulation, StreamId,
};

fn mm1(arrival: Rate, service: Rate, horizon: f64) -> anyhow::Result<Network> {
    let routing = RoutingTable::new(
        Row::deterministic(Destination::Node(NodeId::ONE)),
        vec![Row::deterministic(Destination::Exit)],
    )?;
    let network = Network::builder()
        .routing(routing)
        .nodes(vec![NodeDesc::builder()
            .name("server")
            .service(Sampler::exponential(
                service.mean().into_f64(),
                StreamId::ONE,
            ))
            .build()])
        .arrival(Sampler::exponential(arrival.mean().into_f64(), StreamId::ZERO))
        .horizon(horizon)
        .build()?;
    Ok(network)
}

// A long single-node run should reproduce the closed-form M/M/1 values.
#[test]
fn mm1_matches_theory() -> anyhow::Result<()> {
    let (lambda, mu) = (Rate::new(1.0), Rate::new(2.0));
    let network = mm1(lambda, mu, 200_000.0)?;
    let mut sim = Simulation::new(&network, MultiStream::new(123_456_789));
    sim.start();
    sim.run_until_drained()?;

    let report = sim.report();
    let node = &report.nodes[0];
    let theory = Mm1::new(lambda, mu);
    assert_relative_eq!(node.utilization.unwrap(), theory.utilization(), max_relative = 0.03);
    assert_relative_eq!(node.avg_wait.unwrap(), theory.response().unwrap(), max_relative = 0.05);
    assert_relative_eq!(
        node.avg_delay.unwrap(),
        theory.queue_delay().unwrap(),
        max_relative = 0.08
    );
    assert_relative_eq!(
        report.avg_interarrival.unwrap(),
        lambda.mean().into_f64(),
        max_relative = 0.02
    );
    assert_relative_eq!(
        report.avg_in_system.unwrap(),
        theory.in_system().unwrap(),
        max_relative = 0.05
    );
    Ok(())
}

#[test]
fn conservation_holds_after_drain() -> anyhow::Result<()> {
    let network = mm1(Rate::new(1.0), Rate::new(1.25), 5_000.0)?;
    let mut sim = Simulation::new(&network, MultiStream::new(8));
    sim.start();
    sim.run_until_drained()?;
    let stats = sim.stats();
    assert_eq!(stats.arrivals, stats.departures);
    assert_eq!(stats.refused, 0);
    let node = stats.node(NodeId::ONE);
    assert_eq!(node.served, node.completed);
    assert_eq!(node.arrived, stats.arrivals);
    assert!(node.area >= node.service);
    Ok(())
}
