use bound::graceful_shutdown::GracefulShutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type ShutdownResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::test]
async fn test_graceful_shutdown_creation() {
    let shutdown = GracefulShutdown::new();

    // Initially no shutdown signal should be sent
    let mut receiver = shutdown.subscribe();
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_all_subscribers_receive_signal() {
    let shutdown = GracefulShutdown::new();
    let mut receiver1 = shutdown.subscribe();
    let mut receiver2 = shutdown.subscribe();

    shutdown.shutdown().await.unwrap();

    assert!(receiver1.recv().await.is_ok());
    assert!(receiver2.recv().await.is_ok());
}

#[tokio::test]
async fn test_register_and_shutdown_component() {
    let shutdown = GracefulShutdown::new();
    let shutdown_called = Arc::new(Mutex::new(false));
    let shutdown_called_clone = shutdown_called.clone();

    shutdown
        .register_component("test_component".to_string(), move || {
            let shutdown_called = shutdown_called_clone.clone();
            async move {
                *shutdown_called.lock().await = true;
                ShutdownResult::Ok(())
            }
        })
        .await;

    assert!(shutdown.shutdown().await.is_ok());
    assert!(*shutdown_called.lock().await);
}

#[tokio::test]
async fn test_components_shut_down_in_registration_order() {
    let shutdown = GracefulShutdown::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..3 {
        let order = order.clone();
        shutdown
            .register_component(format!("component_{}", i), move || {
                let order = order.clone();
                async move {
                    order.lock().await.push(i);
                    ShutdownResult::Ok(())
                }
            })
            .await;
    }

    shutdown.shutdown().await.unwrap();
    assert_eq!(*order.lock().await, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_failing_component_does_not_stop_others() {
    let shutdown = GracefulShutdown::new();
    let reached = Arc::new(Mutex::new(false));
    let reached_clone = reached.clone();

    shutdown
        .register_component("failing".to_string(), || async {
            ShutdownResult::Err("component refused to stop".into())
        })
        .await;
    shutdown
        .register_component("after".to_string(), move || {
            let reached = reached_clone.clone();
            async move {
                *reached.lock().await = true;
                ShutdownResult::Ok(())
            }
        })
        .await;

    assert!(shutdown.shutdown().await.is_ok());
    assert!(*reached.lock().await);
}

#[tokio::test]
async fn test_slow_component_times_out() {
    let shutdown = GracefulShutdown::with_component_timeout(Duration::from_millis(50));

    shutdown
        .register_component("slow".to_string(), || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            ShutdownResult::Ok(())
        })
        .await;

    let started = std::time::Instant::now();
    assert!(shutdown.shutdown().await.is_ok());
    assert!(started.elapsed() < Duration::from_secs(5));
}
