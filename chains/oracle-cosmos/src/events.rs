use oracle_core::{CosmosEvent, U256};

use crate::CoinEventError;

const MESSAGE_EVENT: &str = "message";
const COIN_RECEIVED_EVENT: &str = "coin_received";
const COIN_SPENT_EVENT: &str = "coin_spent";

fn events_named<'a>(
    events: &'a [CosmosEvent],
    kind: &'a str,
) -> impl Iterator<Item = &'a CosmosEvent> + 'a {
    events
        .iter()
        .filter(move |event| event.kind.eq_ignore_ascii_case(kind))
}

fn attributes_named<'a>(
    event: &'a CosmosEvent,
    key: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    event
        .attributes
        .iter()
        .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Split a single coin such as `1000upokt` into its amount and check its
/// denom. Bridge deposits move one coin, so coin lists are rejected.
pub fn parse_coins(coin: &str, denom: &str) -> Result<U256, CoinEventError> {
    let coin = coin.trim();
    if coin.contains(',') {
        return Err(CoinEventError::MultipleCoins(coin.to_owned()));
    }
    let split = coin
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| CoinEventError::InvalidAmount(coin.to_owned()))?;
    let (amount, coin_denom) = coin.split_at(split);
    if amount.is_empty() {
        return Err(CoinEventError::InvalidAmount(coin.to_owned()));
    }
    if coin_denom != denom {
        return Err(CoinEventError::InvalidDenom(coin_denom.to_owned()));
    }
    U256::from_dec_str(amount).map_err(|_| CoinEventError::InvalidAmount(coin.to_owned()))
}

/// The bech32 sender recorded by the first `message` event.
pub fn parse_message_sender(events: &[CosmosEvent]) -> Result<String, CoinEventError> {
    events_named(events, MESSAGE_EVENT)
        .find_map(|event| attributes_named(event, "sender").next())
        .map(ToOwned::to_owned)
        .ok_or(CoinEventError::MissingSender)
}

/// Total of `denom` received by `receiver` across all `coin_received` events.
pub fn parse_coins_received(
    denom: &str,
    receiver: &str,
    events: &[CosmosEvent],
) -> Result<U256, CoinEventError> {
    let mut total = U256::zero();
    for event in events_named(events, COIN_RECEIVED_EVENT) {
        let to_receiver =
            attributes_named(event, "receiver").any(|r| r.eq_ignore_ascii_case(receiver));
        if !to_receiver {
            continue;
        }
        for amount in attributes_named(event, "amount") {
            total = total
                .checked_add(parse_coins(amount, denom)?)
                .ok_or_else(|| CoinEventError::InvalidAmount(amount.to_owned()))?;
        }
    }
    Ok(total)
}

/// The single spender and the total of `denom` it spent across all
/// `coin_spent` events.
pub fn parse_coins_spent(
    denom: &str,
    events: &[CosmosEvent],
) -> Result<(Option<String>, U256), CoinEventError> {
    let mut spender: Option<String> = None;
    let mut total = U256::zero();
    for event in events_named(events, COIN_SPENT_EVENT) {
        for (key, value) in &event.attributes {
            if key.eq_ignore_ascii_case("spender") {
                match &spender {
                    Some(existing) if !existing.eq_ignore_ascii_case(value) => {
                        return Err(CoinEventError::MultipleSpenders)
                    }
                    _ => spender = Some(value.clone()),
                }
            } else if key.eq_ignore_ascii_case("amount") {
                total = total
                    .checked_add(parse_coins(value, denom)?)
                    .ok_or_else(|| CoinEventError::InvalidAmount(value.clone()))?;
            }
        }
    }
    Ok((spender, total))
}

#[cfg(test)]
mod test {
    use super::*;

    fn event(kind: &str, attributes: &[(&str, &str)]) -> CosmosEvent {
        CosmosEvent {
            kind: kind.to_owned(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn coin_strings() {
        assert_eq!(parse_coins("1000upokt", "upokt").unwrap(), U256::from(1000));
        assert_eq!(parse_coins(" 7upokt ", "upokt").unwrap(), U256::from(7));
        assert_eq!(
            parse_coins("10uatom", "upokt"),
            Err(CoinEventError::InvalidDenom("uatom".into()))
        );
        assert!(parse_coins("upokt", "upokt").is_err());
        assert!(parse_coins("1000", "upokt").is_err());
    }

    #[test]
    fn coin_lists_are_rejected() {
        assert_eq!(
            parse_coins("1upokt,2upokt", "upokt"),
            Err(CoinEventError::MultipleCoins("1upokt,2upokt".into()))
        );
        assert!(parse_coins("5upokt,1uatom", "upokt").is_err());

        let events = vec![event(
            "coin_received",
            &[("receiver", "multisig"), ("amount", "700upokt,1upokt")],
        )];
        assert!(parse_coins_received("upokt", "multisig", &events).is_err());
    }

    #[test]
    fn received_only_counts_the_receiver() {
        let events = vec![
            event("coin_received", &[("receiver", "multisig"), ("amount", "700upokt")]),
            event("coin_received", &[("receiver", "other"), ("amount", "5upokt")]),
            event("Coin_Received", &[("Receiver", "MULTISIG"), ("amount", "300upokt")]),
        ];
        assert_eq!(
            parse_coins_received("upokt", "multisig", &events).unwrap(),
            U256::from(1000)
        );
    }

    #[test]
    fn spent_requires_a_single_spender() {
        let events = vec![
            event("coin_spent", &[("spender", "alice"), ("amount", "10upokt")]),
            event("coin_spent", &[("spender", "ALICE"), ("amount", "5upokt")]),
        ];
        assert_eq!(
            parse_coins_spent("upokt", &events).unwrap(),
            (Some("alice".to_owned()), U256::from(15))
        );

        let events = vec![
            event("coin_spent", &[("spender", "alice"), ("amount", "10upokt")]),
            event("coin_spent", &[("spender", "bob"), ("amount", "5upokt")]),
        ];
        assert_eq!(
            parse_coins_spent("upokt", &events),
            Err(CoinEventError::MultipleSpenders)
        );
    }

    #[test]
    fn sender_from_message_event() {
        assert_eq!(
            parse_message_sender(&[]),
            Err(CoinEventError::MissingSender)
        );
        let events = vec![
            event("transfer", &[("sender", "ignored")]),
            event("message", &[("action", "send"), ("sender", "alice")]),
        ];
        assert_eq!(parse_message_sender(&events).unwrap(), "alice");
    }
}
