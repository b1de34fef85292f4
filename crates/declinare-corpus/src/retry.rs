/// A value produced by [`bounded`], with the attempt that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    /// 1-based.
    pub attempts: usize,
}

/// Every attempt failed. `last` holds the final failure, if any attempt ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Exhausted<E> {
    pub attempts: usize,
    pub last: Option<E>,
}

/// Run `attempt` (given the 1-based attempt number) until it succeeds or
/// `max_attempts` calls have failed.
pub fn bounded<T, E, F>(max_attempts: usize, mut attempt: F) -> Result<Attempted<T>, Exhausted<E>>
where
    F: FnMut(usize) -> Result<T, E>,
{
    let mut last = None;
    for n in 1..=max_attempts {
        match attempt(n) {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    attempts: n,
                });
            }
            Err(err) => last = Some(err),
        }
    }
    Err(Exhausted {
        attempts: max_attempts,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_first_success() {
        let mut calls = 0;
        let result: Result<_, Exhausted<&str>> = bounded(10, |n| {
            calls += 1;
            if n == 3 { Ok(n * 10) } else { Err("miss") }
        });
        assert_eq!(
            result,
            Ok(Attempted {
                value: 30,
                attempts: 3
            })
        );
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausts_after_exactly_max_attempts() {
        let mut calls = 0;
        let result: Result<Attempted<()>, _> = bounded(7, |n| {
            calls += 1;
            Err(format!("attempt {n}"))
        });
        let err = result.unwrap_err();
        assert_eq!(calls, 7);
        assert_eq!(err.attempts, 7);
        assert_eq!(err.last.as_deref(), Some("attempt 7"));
    }

    #[test]
    fn zero_budget_never_calls() {
        let result: Result<Attempted<()>, Exhausted<()>> =
            bounded(0, |_| panic!("must not run"));
        assert_eq!(
            result,
            Err(Exhausted {
                attempts: 0,
                last: None
            })
        );
    }
}
