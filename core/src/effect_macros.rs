//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when a reducer schedules async work or timers.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use boxoffice_core::async_effect;
///
/// async_effect! {
///     let orders = api.list_orders().await;
///     Some(OrdersAction::Loaded { orders })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use boxoffice_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(1),
///     action: CheckoutAction::Tick
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::{Effect, EffectId};
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Loaded { value: i32 },
        Tick,
    }

    #[tokio::test]
    async fn test_async_effect_macro() {
        let effect = async_effect! {
            Some(TestAction::Loaded { value: 42 })
        };

        let Effect::Future(fut) = effect else {
            unreachable!("async_effect! always builds Effect::Future");
        };
        assert_eq!(fut.await, Some(TestAction::Loaded { value: 42 }));
    }

    #[test]
    fn test_delay_macro() {
        let effect = delay! {
            duration: Duration::from_secs(1),
            action: TestAction::Tick
        };

        assert!(matches!(
            effect,
            Effect::Delay { duration, ref action } if duration == Duration::from_secs(1) && **action == TestAction::Tick
        ));
    }

    #[test]
    fn test_delay_macro_composes_with_cancellable() {
        let effect = delay! {
            duration: Duration::from_millis(10),
            action: TestAction::Tick
        }
        .cancellable(EffectId::new("tick"));

        assert!(effect.is_delay());
        assert_eq!(effect.cancellation_id(), Some(EffectId::new("tick")));
    }
}
