use std::cell::RefCell;
use std::rc::Rc;

use stately_core::prelude::*;
use stately_locator::*;

trait Repository {
    fn titles(&self) -> Vec<String>;
}

struct InMemory(Vec<&'static str>);

impl Repository for InMemory {
    fn titles(&self) -> Vec<String> {
        self.0.iter().map(|t| t.to_string()).collect()
    }
}

struct Filter(String);

/// Todo titles filtered by a query, both pulled from the host.
struct VisibleTodos {
    notifier: StateNotifier<Rc<Vec<String>>>,
    locator: LocatorExtension,
}

impl VisibleTodos {
    fn new(resolver: Locator) -> Self {
        let notifier = StateNotifier::new(Rc::new(Vec::new()));
        Self {
            locator: LocatorExtension::new(notifier.listenable(), resolver),
            notifier,
        }
    }

    fn compute(repo: &dyn Repository, filter: &Filter) -> Rc<Vec<String>> {
        Rc::new(
            repo.titles()
                .into_iter()
                .filter(|t| t.contains(filter.0.as_str()))
                .collect(),
        )
    }
}

impl Dependent for VisibleTodos {
    fn locator(&self) -> &LocatorExtension {
        &self.locator
    }

    fn init_state(&self) -> Result<(), LocatorError> {
        let repo = self.read::<Rc<dyn Repository>>()?;
        let filter = self.read::<Filter>()?;
        Ok(self.notifier.set_state(Self::compute(&**repo, &filter))?)
    }

    fn update(&self, watch: &Locator) -> Result<(), LocatorError> {
        let repo = watch.get::<Rc<dyn Repository>>()?;
        let filter = watch.get::<Filter>()?;
        Ok(self.notifier.set_state(Self::compute(&**repo, &filter))?)
    }
}

fn host(filter: &str) -> Locator {
    let repo: Rc<dyn Repository> = Rc::new(InMemory(vec!["buy milk", "walk dog", "buy bread"]));
    DependencyRegistry::new()
        .provide(repo)
        .provide(Filter(filter.to_string()))
        .into_locator()
}

#[test]
fn host_drives_init_and_updates() {
    let todos = VisibleTodos::new(host("buy"));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _remove = todos
        .notifier
        .subscribe_with(
            {
                let seen = seen.clone();
                move |titles: &Rc<Vec<String>>| {
                    seen.borrow_mut().push(titles.len());
                    Ok(())
                }
            },
            false,
        )
        .unwrap();

    todos.debug_update().unwrap();
    assert_eq!(
        *todos.notifier.state().unwrap(),
        vec!["buy milk".to_string(), "buy bread".to_string()]
    );

    // dependencies changed upstream
    todos.dispatch_update(&host("walk")).unwrap();
    assert_eq!(*todos.notifier.state().unwrap(), vec!["walk dog".to_string()]);

    // init then update, then the second host
    assert_eq!(*seen.borrow(), vec![2, 2, 1]);
}

#[test]
fn mocked_filter_overrides_the_host() {
    let todos = VisibleTodos::new(host("buy"));
    todos.locator.mock_dependency(Filter("dog".into())).unwrap();

    todos.debug_update().unwrap();
    assert_eq!(*todos.notifier.state().unwrap(), vec!["walk dog".to_string()]);
}
