//! Three parties derive a session key over the simulated network
//!
//! ```text
//! cargo run --example bohli_simulation
//! ```

use std::sync::Arc;

use futures::future;
use rand::rngs::OsRng;

use bohli_deniable::protocol::run_session;
use bohli_deniable::roster::Roster;
use bohli_deniable::simulation::Simulation;
use bohli_deniable::{GroupParameters, KeyPair, Msg, Participant, SessionConfig};

const N: u16 = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SessionConfig::new(
        Arc::new(GroupParameters::rfc5114_1024_160()),
        b"bohli demo session".to_vec(),
    );

    // Long-term keys are known to everybody before the session starts
    let keypairs = (0..N)
        .map(|_| KeyPair::generate(config.group(), &mut OsRng))
        .collect::<Result<Vec<_>, _>>()?;
    let public_keys = Roster::new(
        keypairs
            .iter()
            .map(|keypair| keypair.public_key().clone())
            .collect(),
    )?;

    let mut simulation = Simulation::<Msg>::new();
    let mut running = vec![];
    for (i, keypair) in (0..N).zip(keypairs) {
        let participant = Participant::new(i, keypair, public_keys.clone(), &config)?;
        let delivery = simulation.connect_new_party();
        let config = config.clone();
        running.push(async move { run_session(delivery, participant, &mut OsRng, &config).await });
    }
    let outputs = future::try_join_all(running).await?;

    for (i, keys) in outputs.iter().enumerate() {
        println!("party {i}: session key     {}", keys.session_key);
        println!("party {i}: confirmation    {}", keys.confirmation);
    }
    if outputs.iter().all(|keys| *keys == outputs[0]) {
        println!("all parties agree");
    }
    Ok(())
}
