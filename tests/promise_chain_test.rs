use promise_chain::{Continuation, Error, Promise};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

fn delayed<T: Send + 'static>(ms: u64, outcome: Result<T, Error>) -> Promise<T> {
    Promise::new(move |resolve, reject| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(ms));
            match outcome {
                Ok(value) => resolve(value),
                Err(error) => reject(error),
            }
        });
        Ok(())
    })
}

#[cfg(test)]
mod chain_tests {
    use super::*;

    #[test]
    fn test_chain_rejects_at_tail() {
        init_logger();
        let err = Promise::resolved()
            .then(|()| Ok(1))
            .then(|n| Ok(n + 1))
            .then_promise(|_| Promise::<()>::reject(Error::msg("x")))
            .wait()
            .unwrap_err();
        assert_eq!(err.to_string(), "x");
    }

    #[test]
    fn test_catch_before_tail_fulfills() {
        init_logger();
        let logged = Arc::new(Mutex::new(Vec::new()));
        let log = logged.clone();
        let outcome = Promise::resolved()
            .then(|()| Ok(1))
            .then(|n| Ok(n + 1))
            .then_promise(|_| Promise::<()>::reject(Error::msg("x")))
            .catch(move |err| {
                log.lock().unwrap().push(err.to_string());
                Ok(())
            })
            .wait();
        assert!(outcome.is_ok());
        assert_eq!(*logged.lock().unwrap(), vec![String::from("x")]);
    }

    #[test]
    fn test_steps_after_failure_are_skipped() {
        init_logger();
        let steps = Arc::new(Mutex::new(Vec::new()));
        let (s1, s2, s3, s4, s5) = (
            steps.clone(),
            steps.clone(),
            steps.clone(),
            steps.clone(),
            steps.clone(),
        );
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        Promise::resolved()
            .then(move |()| {
                s1.lock().unwrap().push("then 1");
                Ok(())
            })
            .then_async(move |()| async move {
                s2.lock().unwrap().push("then 2");
                Err::<(), _>(Error::msg("task ex 2"))
            })
            .then_promise(move |()| {
                s3.lock().unwrap().push("then 3");
                Promise::<()>::reject(Error::msg("promise ex 3"))
            })
            .then(move |()| {
                s4.lock().unwrap().push("then 4");
                Ok(())
            })
            .catch(move |err| {
                s5.lock().unwrap().push("catch");
                assert_eq!(err.to_string(), "task ex 2");
                Ok(())
            })
            .finally(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .wait()
            .unwrap();
        assert_eq!(*steps.lock().unwrap(), vec!["then 1", "then 2", "catch"]);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_value_threads_through_shapes() {
        init_logger();
        let value = Promise::resolved()
            .then(|()| Ok(99))
            .then(|n| Ok(n - 11))
            .then_async(|n| async move {
                let waited = delayed(20, Ok(n)).await?;
                Ok::<_, Error>(waited - 11)
            })
            .then_promise(|n| Promise::resolve(n).then(|n| Ok(format!("num={}", n))))
            .wait()
            .unwrap();
        assert_eq!(value, "num=77");
    }

    #[test]
    fn test_await_inside_async_context() {
        init_logger();
        let value = futures::executor::block_on(async {
            let first = delayed(10, Ok(5)).await?;
            let second = Promise::resolve(first).then(|n| Ok(n * 3)).await?;
            Ok::<_, Error>(second)
        })
        .unwrap();
        assert_eq!(value, 15);
    }

    #[test]
    fn test_finally_settles_like_upstream() {
        init_logger();
        let runs = Arc::new(AtomicUsize::new(0));
        let (r1, r2) = (runs.clone(), runs.clone());
        let ok = delayed(10, Ok("v")).finally(move || {
            r1.fetch_add(1, Ordering::SeqCst);
        });
        let err = delayed::<&str>(10, Err(Error::msg("e"))).finally(move || {
            r2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ok.wait().unwrap(), "v");
        assert_eq!(err.wait().unwrap_err().to_string(), "e");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rejection_handler_sees_unwrapped_error() {
        init_logger();
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        let value: String = Promise::<String>::reject(Error::Aggregate(vec![Error::Aggregate(vec![
            Error::msg("root cause"),
        ])]))
        .then_or_else(Continuation::map(Ok), move |err| {
            *slot.lock().unwrap() = Some(err.to_string());
            Ok(())
        })
        .wait()
        .unwrap();
        assert_eq!(value, "");
        assert_eq!(seen.lock().unwrap().as_deref(), Some("root cause"));
    }

    #[test]
    fn test_pending_promise_settles_once() {
        init_logger();
        let (resolver, promise) = Promise::<u8>::pending();
        assert!(resolver.resolve(1));
        assert!(!resolver.reject(Error::msg("ignored")));
        assert_eq!(promise.wait().unwrap(), 1);
    }
}

#[cfg(test)]
mod combinator_tests {
    use super::*;

    #[test]
    fn test_any_picks_fastest_success() {
        init_logger();
        let value = Promise::<i32>::any([delayed(150, Ok(99)), delayed(100, Ok(88)), delayed(10, Ok(77))])
            .wait()
            .unwrap();
        assert_eq!(value, 77);
    }

    #[test]
    fn test_any_all_fail() {
        init_logger();
        let err = Promise::<i32>::any([
            delayed(30, Err(Error::msg("promise ex 1"))),
            delayed(30, Err(Error::msg("promise ex 2"))),
        ])
        .wait()
        .unwrap_err();
        let message = err.to_string();
        assert!(message == "promise ex 1" || message == "promise ex 2");
    }

    #[test]
    fn test_race_with_catch_and_finally() {
        init_logger();
        let (tx, rx) = std::sync::mpsc::channel();
        Promise::<i32>::race([delayed(150, Ok(99)), delayed(150, Ok(88)), delayed(10, Ok(77))])
            .then(move |n| {
                tx.send(n).unwrap();
                Ok(())
            })
            .catch(|_| Ok(()))
            .finally(|| {})
            .wait()
            .unwrap();
        assert_eq!(rx.recv().unwrap(), 77);
    }

    #[test]
    fn test_all_of_untyped_promises() {
        init_logger();
        let done = Promise::<()>::all([Promise::resolved(), delayed(20, Ok(())), Promise::resolved()])
            .wait()
            .unwrap();
        assert_eq!(done.len(), 3);
    }

    #[test]
    fn test_race_against_timer_for_timeout() {
        init_logger();
        let (_never, pending) = Promise::<&str>::pending();
        let err = Promise::<&str>::race([pending, delayed(20, Err(Error::msg("timed out")))])
            .wait()
            .unwrap_err();
        assert_eq!(err.to_string(), "timed out");
    }
}
