use kuroibara_core::StreamHandle;

#[tokio::test(flavor = "multi_thread")]
async fn streamhandle_stop_graceful() {
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let _ = stop_rx.await;
        let _ = done_tx.send(());
    });

    let handle = StreamHandle::new(task, stop_tx);
    handle.stop().await;

    let _ = tokio::time::timeout(std::time::Duration::from_millis(100), done_rx)
        .await
        .expect("task did not complete after stop()");
}

#[tokio::test(flavor = "multi_thread")]
async fn streamhandle_abort_only_cancels_task() {
    let task = tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
    });

    let handle = StreamHandle::new_abort_only(task);
    handle.abort();
}
