use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::json;
use siteblock_core::{ActivePage, BlockedWebsite, Language};
use siteblock_engine::{BlockedWebsites, HookPhase};
use siteblock_harness::TestHost;

// ============================================================================
// Two contexts, one store
// ============================================================================

#[test]
fn append_in_one_context_reaches_the_other() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::new();
    let popup = host.add_surface();
    let options = host.add_surface();

    assert!(host.surface(options).websites.current().is_empty());
    host.surface(popup)
        .blocker
        .websites()
        .append(vec![BlockedWebsite::new("y.com", "Y")])?;

    assert!(host.surface(options).sees("y.com"));
    assert!(host.surface(popup).sees("y.com"));
    assert_eq!(host.surface(options).websites.phase(), HookPhase::Ready);
    Ok(())
}

#[test]
fn every_surface_ends_on_the_last_write() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::new();
    let a = host.add_surface();
    let b = host.add_surface();
    let c = host.add_surface();

    host.surface(a).blocker.websites().add_domain("one.com")?;
    host.surface(b).blocker.websites().add_domain("two.com")?;
    host.surface(c).blocker.websites().remove("one.com")?;
    host.surface(a).blocker.websites().toggle("two.com")?;

    let stored = BlockedWebsites::new(host.store()).get_all()?;
    for surface in host.surfaces() {
        assert_eq!(surface.websites.current(), stored);
    }
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].blocked);
    Ok(())
}

#[test]
fn enabled_flag_and_verdict_follow_other_context() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::new();
    let popup = host.add_surface();
    let content = host.add_surface();

    host.surface(popup).blocker.websites().add_active_page(&ActivePage {
        domain: Some("video.example".into()),
        title: Some("Video".into()),
        favicon_url: None,
    })?;
    assert!(!host.surface(content).would_block("video.example"));

    host.surface(popup).blocker.enabled().toggle()?;
    assert!(host.surface(content).enabled.current());
    assert!(host.surface(content).would_block("video.example"));
    assert!(host.surface(content).blocker.is_blocked("video.example")?);
    assert!(!host.surface(content).would_block("other.example"));
    Ok(())
}

#[test]
fn external_raw_write_is_validated_before_delivery() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::new();
    let surface = host.add_surface();
    host.store().set(
        "blockedDomains-v2",
        json!([
            {"domain": "ok.com", "title": "OK", "blocked": "yes"},
            {"domain": "", "title": "empty"},
            42,
            {"domain": "ok.com", "title": "duplicate"},
        ]),
    )?;
    let current = host.surface(surface).websites.current();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].title, "OK");
    assert!(current[0].blocked);
    Ok(())
}

#[test]
fn clearing_the_key_empties_every_surface() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::new();
    let a = host.add_surface();
    let b = host.add_surface();
    host.surface(a).blocker.websites().add_domain("a.com")?;
    assert!(host.surface(b).sees("a.com"));
    host.surface(a).blocker.websites().clear()?;
    assert!(host.surface(b).domains().is_empty());
    Ok(())
}

#[test]
fn reopened_surface_reseeds() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::new();
    let a = host.add_surface();
    let b = host.add_surface();

    host.surface_mut(b).websites.deactivate();
    host.surface(a).blocker.websites().add_domain("late.com")?;
    assert!(!host.surface(b).sees("late.com"));

    host.surface_mut(b).reopen();
    assert!(host.surface(b).sees("late.com"));
    assert_eq!(host.surface(b).websites.events_seen(), 0);
    Ok(())
}

#[test]
fn subscribe_delivers_validated_collections() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::new();
    let a = host.add_surface();
    let b = host.add_surface();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = host.surface(b).blocker.subscribe(move |websites| {
        sink.lock().unwrap().push(websites.len());
    });

    host.surface(a).blocker.websites().add_domain("a.com")?;
    host.surface(a).blocker.websites().add_domain("b.com")?;
    subscription.unsubscribe();
    host.surface(a).blocker.websites().add_domain("c.com")?;

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    Ok(())
}

#[test]
fn language_preference_is_shared() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::new();
    let a = host.add_surface();
    let b = host.add_surface();
    let mut hook = host.surface(b).blocker.language_hook();
    hook.activate();
    assert_eq!(hook.current(), Language::English);
    host.surface(a).blocker.language().set(Language::Portuguese)?;
    assert_eq!(hook.current(), Language::Portuguese);
    Ok(())
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn concurrent_writers_converge_on_stored_state() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::new();
    let observers: Vec<usize> = (0..3).map(|_| host.add_surface()).collect();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let accessor = BlockedWebsites::new(host.store());
            thread::spawn(move || {
                for round in 0..10 {
                    let domain = format!("w{worker}-r{round}.example");
                    // Lost updates are allowed; errors are not.
                    accessor.add_domain(&domain).map(|_| ())?;
                }
                Ok::<(), siteblock_engine::EngineError>(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().map_err(|_| "writer panicked")??;
    }

    let stored = BlockedWebsites::new(host.store()).get_all()?;
    assert!(!stored.is_empty());
    for index in observers {
        assert_eq!(host.surface(index).websites.current(), stored);
    }
    Ok(())
}

// ============================================================================
// SQLite host
// ============================================================================

#[test]
fn sqlite_host_propagates_changes() -> Result<(), Box<dyn std::error::Error>> {
    let mut host = TestHost::sqlite()?;
    let a = host.add_surface();
    let b = host.add_surface();

    host.surface(a).blocker.websites().add_domain("persisted.com")?;
    host.surface(a).blocker.enabled().set(true)?;
    assert!(host.surface(b).would_block("persisted.com"));

    let path = host
        .config()
        .store
        .sqlite_path
        .clone()
        .ok_or("sqlite host without a path")?;
    assert!(path.exists());
    Ok(())
}
