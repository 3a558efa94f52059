use pm_core::models::{BidInfo, MarketBasis, PriceInfo, PricePoint};
use pm_han::{DecodeError, EncodeError, HanCodec, HanMessage, MessageType, peek_message_type};
use proptest::prelude::*;
use rstest::*;
use std::sync::Arc;

/// The basis whose wire basis is itself: one currency unit per step
#[fixture]
fn unit_basis() -> Arc<MarketBasis> {
    Arc::new(MarketBasis::new("electricity", "EUR", 255, -127.0, 127.0, 128).unwrap())
}

#[fixture]
fn codec(unit_basis: Arc<MarketBasis>) -> HanCodec {
    HanCodec::with_internal_basis(Some(unit_basis))
}

#[rstest]
fn test_price_layout(codec: HanCodec, unit_basis: Arc<MarketBasis>) {
    let bytes = codec
        .encode_price(&PriceInfo::new(unit_basis, -123.0))
        .unwrap();
    assert_eq!(hex::encode(&bytes), "0101858045555203e801");
}

#[rstest]
fn test_price_round_trip(codec: HanCodec, unit_basis: Arc<MarketBasis>) {
    let price = PriceInfo::new(unit_basis.clone(), -123.0);
    let decoded = codec.decode_price(&codec.encode_price(&price).unwrap()).unwrap();
    assert_eq!(decoded, price);
    assert_eq!(decoded.market_basis().market_ref(), 128);
}

#[rstest]
fn test_bid_layout(codec: HanCodec, unit_basis: Arc<MarketBasis>) {
    let bid = BidInfo::from_points(
        unit_basis,
        vec![PricePoint::new(-10.0, 12345.0), PricePoint::new(20.0, -23456.0)],
    )
    .unwrap();
    let bytes = codec.encode_bid(&bid).unwrap();
    assert_eq!(bytes.len(), 6 + 2 * 3);
    assert_eq!(hex::encode(&bytes), "01028000010281303914a460");
}

#[rstest]
fn test_bid_round_trip(codec: HanCodec, unit_basis: Arc<MarketBasis>) {
    let bid = BidInfo::from_points(
        unit_basis,
        vec![PricePoint::new(-10.0, 12345.0), PricePoint::new(20.0, -23456.0)],
    )
    .unwrap();
    let HanMessage::Bid(decoded) = codec.decode(&codec.encode_bid(&bid).unwrap()).unwrap() else {
        panic!("expected a bid");
    };
    assert_eq!(decoded, bid);
}

#[rstest]
fn test_zero_bid_layout(codec: HanCodec, unit_basis: Arc<MarketBasis>) {
    let bytes = codec.encode_bid(&BidInfo::zero(unit_basis.clone())).unwrap();
    // a demand unit of zero, and one point at the lowest price
    assert_eq!(hex::encode(&bytes), "010280000001810000");

    let decoded = codec.decode_bid(&bytes).unwrap();
    assert_eq!(decoded, BidInfo::zero(unit_basis));
}

#[test]
fn test_large_demand_is_scaled() {
    let basis = Arc::new(MarketBasis::new("electricity", "EUR", 255, -127.0, 127.0, 1).unwrap());
    let codec = HanCodec::with_internal_basis(Some(basis.clone()));
    let bid = BidInfo::from_points(
        basis,
        vec![PricePoint::new(0.0, 100_000.0), PricePoint::new(50.0, -70_001.0)],
    )
    .unwrap();

    let bytes = codec.encode_bid(&bid).unwrap();
    // ceil(100000 / 32767) = 4
    assert_eq!(&bytes[3..5], &[0, 4]);

    let decoded = codec.decode_bid(&bytes).unwrap();
    assert_eq!(decoded.maximum_demand(), 100_000.0);
    // -70001 / 4 rounds to -17500
    assert_eq!(decoded.minimum_demand(), -70_000.0);
}

#[test]
fn test_bid_needs_a_known_market_ref() {
    let sender = HanCodec::default();
    let basis = Arc::new(MarketBasis::new("electricity", "EUR", 255, -127.0, 127.0, 128).unwrap());
    let bid = BidInfo::from_demand(basis.clone(), vec![1.0; 255]).unwrap();
    let bid_bytes = sender.encode_bid(&bid).unwrap();

    let receiver = HanCodec::default();
    assert!(matches!(
        receiver.decode_bid(&bid_bytes),
        Err(DecodeError::UnknownMarketRef(128))
    ));

    // a price under the same reference announces the basis
    let price_bytes = sender.encode_price(&PriceInfo::new(basis, 3.0)).unwrap();
    receiver.decode(&price_bytes).unwrap();
    let decoded = receiver.decode_bid(&bid_bytes).unwrap();
    assert_eq!(decoded.demand(), bid.demand());
    assert_eq!(decoded.market_basis().market_ref(), 128);
}

#[test]
fn test_price_on_a_coarse_basis_is_within_one_step() {
    let internal = Arc::new(MarketBasis::new("electricity", "EUR", 5, 0.0, 10.0, 2).unwrap());
    let codec = HanCodec::with_internal_basis(Some(internal.clone()));

    let bytes = codec.encode_price(&PriceInfo::new(internal.clone(), 7.5)).unwrap();
    // round(10 / 127 * 1000) = 79 thousandths per step
    assert_eq!(u16::from_be_bytes([bytes[7], bytes[8]]), 79);

    let decoded = codec.decode_price(&bytes).unwrap();
    assert_eq!(decoded.market_basis(), &internal);
    approx::assert_abs_diff_eq!(decoded.current_price(), 7.5, epsilon = 0.079);
}

#[rstest]
#[case::empty(&[], DecodeError::TooShort { expected: 2, actual: 0 })]
#[case::version(&[2, 1, 0, 0, 0, 0, 0, 0, 0, 0], DecodeError::UnsupportedVersion(2))]
#[case::message_type(&[1, 9], DecodeError::UnknownMessageType(9))]
#[case::undefined(&[1, 0], DecodeError::UnknownMessageType(0))]
#[case::truncated_price(&[1, 1, 0, 0], DecodeError::TooShort { expected: 10, actual: 4 })]
#[case::truncated_points(&[1, 2, 0, 0, 1, 2, 0, 0, 0], DecodeError::TooShort { expected: 12, actual: 9 })]
#[case::commodity(&[1, 1, 0, 0, b'E', b'U', b'R', 3, 232, 5], DecodeError::UnknownCommodity(5))]
fn test_malformed_messages(#[case] bytes: &[u8], #[case] expected: DecodeError) {
    let err = HanCodec::default().decode(bytes).unwrap_err();
    assert_eq!(err.to_string(), expected.to_string());
}

#[test]
fn test_decoder_checks_message_type() {
    let err = HanCodec::default().decode_bid(&[1, 1, 0, 0, 0, 0]).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::UnexpectedMessageType {
            expected: MessageType::Bid,
            actual: MessageType::Price
        }
    ));
    assert_eq!(peek_message_type(&[1, 2]).unwrap(), MessageType::Bid);
}

#[test]
fn test_zero_exchange_rate_is_rejected() {
    let err = HanCodec::default()
        .decode_price(&[1, 1, 0, 0, b'E', b'U', b'R', 0, 0, 1])
        .unwrap_err();
    assert!(matches!(err, DecodeError::InvalidMarketBasis(_)));
}

#[rstest]
#[case("EURO")]
#[case("€")]
fn test_invalid_currency(#[case] currency: &str) {
    let basis = Arc::new(MarketBasis::new("electricity", currency, 5, 0.0, 10.0, 0).unwrap());
    let err = HanCodec::default()
        .encode_price(&PriceInfo::new(basis, 1.0))
        .unwrap_err();
    assert!(matches!(err, EncodeError::InvalidCurrency(_)));
}

#[test]
fn test_unknown_commodity_encodes_as_undefined() {
    let basis = Arc::new(MarketBasis::new("heat", "EUR", 5, 0.0, 10.0, 0).unwrap());
    let bytes = HanCodec::default()
        .encode_price(&PriceInfo::new(basis, 1.0))
        .unwrap();
    assert_eq!(bytes[9], 0);
}

/// Non-increasing integer demand over 11 steps
fn demand() -> impl Strategy<Value = Vec<f64>> {
    (
        -1_000_000i64..1_000_000,
        proptest::collection::vec(0i64..200_000, 10),
    )
        .prop_map(|(start, drops)| {
            let mut demand = vec![start as f64];
            for drop in drops {
                let last = demand[demand.len() - 1];
                demand.push(last - drop as f64);
            }
            demand
        })
}

proptest! {
    #[test]
    fn bid_survives_the_wire_within_one_unit(demand in demand()) {
        let internal = Arc::new(MarketBasis::new("electricity", "EUR", 11, -50.0, 50.0, 6).unwrap());
        let codec = HanCodec::with_internal_basis(Some(internal.clone()));
        let bid = BidInfo::from_demand(internal, demand).unwrap();

        let decoded = codec.decode_bid(&codec.encode_bid(&bid).unwrap()).unwrap();
        let unit = bid.scale_factor(f64::from(i16::MAX)).ceil().max(1.0);
        for (sent, received) in bid.demand().iter().zip(decoded.demand()) {
            prop_assert!((sent - received).abs() <= unit, "{sent} vs {received} (unit {unit})");
        }
    }
}
