use anyhow::anyhow;
use stately_core::prelude::*;
use stately_locator::*;

/// How much each tick adds. Provided by the host.
struct Step(i64);

struct Counter {
    notifier: StateNotifier<i64>,
    locator: LocatorExtension,
}

impl Counter {
    fn new(resolver: Locator) -> Self {
        let notifier = StateNotifier::new(0);
        Self {
            locator: LocatorExtension::new(notifier.listenable(), resolver),
            notifier,
        }
    }

    fn listenable(&self) -> StateListenable<i64> {
        self.notifier.listenable()
    }

    fn reset(&self) -> Result<(), StateError> {
        self.notifier.set_state(0)
    }
}

impl Dependent for Counter {
    fn locator(&self) -> &LocatorExtension {
        &self.locator
    }

    fn init_state(&self) -> Result<(), LocatorError> {
        let step = self.read::<Step>()?;
        log::info!("starting at {}", step.0);
        Ok(self.notifier.set_state(step.0)?)
    }

    fn update(&self, watch: &Locator) -> Result<(), LocatorError> {
        let step = watch.get::<Step>()?;
        Ok(self.notifier.update(|count| count + step.0)?)
    }
}

// Notifier errors hold `Rc`s, so they are flattened into messages here.
fn lift(err: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("{err}")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let counter = Counter::new(DependencyRegistry::new().provide(Step(2)).into_locator());
    let listenable = counter.listenable();

    let print = listenable
        .subscribe(|count: &i64| {
            println!("count: {count}");
            Ok(())
        })
        .map_err(lift)?;
    let _guard = listenable
        .subscribe_with(
            |count: &i64| {
                if *count > 5 {
                    anyhow::bail!("count {count} is over the limit");
                }
                Ok(())
            },
            false,
        )
        .map_err(lift)?;

    for _ in 0..3 {
        if let Err(err) = counter.debug_update() {
            println!("tick failed: {}", lift(err));
        }
    }

    counter
        .notifier
        .set_error_handler(|err, _| println!("handled: {err}"))
        .map_err(lift)?;
    if let Err(err) = counter.debug_update() {
        println!("tick failed after handling: {}", lift(err));
    }

    print.remove();
    counter.reset().map_err(lift)?;
    println!("after reset: {}", counter.notifier.state().map_err(lift)?);

    listenable.dispose().map_err(lift)?;
    if let Err(err) = counter.notifier.state() {
        println!("{err}");
    }
    Ok(())
}
