use common::{Money, Role, TicketStatus};
use criterion::{Criterion, criterion_group, criterion_main};
use market_store::{InMemoryMarketStore, MarketStore, TicketQuery};
use marketplace::{Marketplace, NewEvent, NewStaff};

const SUPPLY: u32 = 5_000;

/// A marketplace with one large event and a rich customer.
fn setup(
    rt: &tokio::runtime::Runtime,
) -> (Marketplace<InMemoryMarketStore>, common::User, common::Event) {
    rt.block_on(async {
        let market = Marketplace::new(InMemoryMarketStore::new());
        let admin = market
            .bootstrap_admin("admin", "admin123")
            .await
            .unwrap()
            .unwrap();
        let organizer = market
            .create_staff(admin.id, NewStaff::new("org", "orgpass", Role::Organizer))
            .await
            .unwrap();
        let event = market
            .create_event(
                organizer.id,
                NewEvent::new(
                    "Bench Arena",
                    "BENCH",
                    "2026-12-31",
                    Money::from_cents(100),
                    Money::from_cents(500),
                    SUPPLY,
                ),
            )
            .await
            .unwrap();
        let buyer = market.register("buyer", "buyerpw").await.unwrap();
        market
            .top_up(buyer.id, Money::from_units(1_000_000))
            .await
            .unwrap();
        (market, buyer, event)
    })
}

fn bench_purchase(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (market, buyer, event) = setup(&rt);

    c.bench_function("marketplace/purchase", |b| {
        b.iter(|| {
            rt.block_on(async {
                let next = market
                    .store()
                    .list_tickets(
                        TicketQuery::for_event(event.id)
                            .status(TicketStatus::Available)
                            .limit(1),
                    )
                    .await
                    .unwrap();
                if let Some(ticket) = next.first() {
                    market.purchase(ticket.id, buyer.id).await.unwrap();
                }
            });
        });
    });
}

fn bench_mint(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (market, _, event) = setup(&rt);
    let organizer = rt
        .block_on(market.user_by_wallet(&event.creator))
        .unwrap();

    c.bench_function("marketplace/create_event_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                market
                    .create_event(
                        organizer.id,
                        NewEvent::new(
                            "Bench Club",
                            "CLUB",
                            "2026-12-31",
                            Money::from_cents(100),
                            Money::from_cents(200),
                            100,
                        ),
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_purchase, bench_mint);
criterion_main!(benches);
