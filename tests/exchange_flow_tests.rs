//! End-to-end two-party exchange over a live hub and coordinator

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::sleep;

use confidential_wallet_libs::coordinator::{run_coordinator, Coordinator};
use confidential_wallet_libs::crypto::commitment::{commit, random_scalar};
use confidential_wallet_libs::data_structures::types::CompressedPoint;
use confidential_wallet_libs::data_structures::wallet_output::WalletOutput;
use confidential_wallet_libs::errors::{MessageError, WalletError};
use confidential_wallet_libs::ledger::RecordStore;
use confidential_wallet_libs::messaging::{
    CommandKind, CoordinationMessage, MessageClient, MessageDispatcher, MessageHub, TxRef,
};
use confidential_wallet_libs::wallet::{
    run_receiver, send_transaction, ReceiveHandler, WalletStorage,
};

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

struct Network {
    store: Arc<Mutex<RecordStore>>,
    push_addr: String,
    subscribe_addr: String,
    dir: tempfile::TempDir,
}

async fn start_network() -> Network {
    let dir = tempdir().unwrap();
    let store = Arc::new(Mutex::new(
        RecordStore::open(dir.path().join("ledger.dat")).unwrap(),
    ));

    let push_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let subscribe_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let push_addr = push_listener.local_addr().unwrap().to_string();
    let subscribe_addr = subscribe_listener.local_addr().unwrap().to_string();

    let (hub, broadcasts) = MessageHub::new(push_listener, subscribe_listener);
    let publisher = hub.publisher();
    let coordinator = Coordinator::new(Arc::clone(&store));
    tokio::spawn(hub.run());
    tokio::spawn(run_coordinator(coordinator, broadcasts, publisher));

    Network {
        store,
        push_addr,
        subscribe_addr,
        dir,
    }
}

/// Put a commitment for `value` on the ledger and record it confirmed in
/// the wallet
async fn mint(network: &Network, storage: &WalletStorage, value: u64) {
    let blinding = random_scalar();
    let commitment = CompressedPoint::compress(&commit(value, &blinding)).unwrap();
    let index = network.store.lock().await.put(&commitment).unwrap();
    storage
        .insert(&WalletOutput::new(commitment, blinding, value))
        .unwrap();
    storage.confirm(&commitment, index).unwrap();
}

#[tokio::test]
async fn two_party_send_moves_value_and_updates_the_ledger() {
    let network = start_network().await;

    let harry = WalletStorage::open_in_memory().unwrap();
    mint(&network, &harry, 100).await;

    // Sally's wallet lives in a file so the listening task and the test
    // assertions can each hold their own connection.
    let sally_db = network.dir.path().join("sally.db");
    // WalletStorage is !Sync (rusqlite Connection), so the receiver runs on
    // its own thread with a single-threaded runtime instead of tokio::spawn.
    {
        let path = sally_db.clone();
        let push_addr = network.push_addr.clone();
        let subscribe_addr = network.subscribe_addr.clone();
        std::thread::spawn(move || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(async move {
                    let client = MessageClient::new(&push_addr, &subscribe_addr);
                    let subscription = client.subscribe().await.unwrap();
                    let storage = WalletStorage::open(path).unwrap();
                    let (_dispatcher, mut inbound, _drain) =
                        MessageDispatcher::spawn(subscription);
                    run_receiver(ReceiveHandler::new("sally"), &storage, &client, &mut inbound)
                        .await;
                });
        });
    }
    // Let the hub register sally's subscription before anything is pushed.
    sleep(Duration::from_millis(100)).await;

    let harry_client = MessageClient::new(&network.push_addr, &network.subscribe_addr);
    let subscription = harry_client.subscribe().await.unwrap();
    let (dispatcher, _fallback, _drain) = MessageDispatcher::spawn(subscription);

    send_transaction(&harry, &harry_client, &dispatcher, "sally", 10, EXCHANGE_TIMEOUT)
        .await
        .unwrap();

    assert_eq!(harry.balance().unwrap(), 90);

    // Sally confirms her output when the final broadcast reaches her.
    sleep(Duration::from_millis(300)).await;
    let sally = WalletStorage::open(&sally_db).unwrap();
    assert_eq!(sally.balance().unwrap(), 10);

    // The spent slot was tombstoned and reused; exactly the change and
    // the received output are live.
    {
        let mut store = network.store.lock().await;
        assert_eq!(store.count(), 2);
        assert!(store.exists(0).unwrap());
        assert!(store.exists(1).unwrap());
    }

    // Every confirmed wallet output matches a live ledger record.
    for storage in [&harry, &sally] {
        for output in storage.confirmed_outputs().unwrap() {
            let index = output.index.unwrap();
            let (point, _) = network.store.lock().await.get(index).unwrap();
            assert_eq!(point, output.commitment);
            assert_eq!(
                commit(output.value, &output.blinding),
                output.commitment.decompress().unwrap()
            );
        }
    }

    // Spending the full remaining balance produces no change output.
    send_transaction(&harry, &harry_client, &dispatcher, "sally", 90, EXCHANGE_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(harry.balance().unwrap(), 0);
    assert!(harry.all_outputs().unwrap().is_empty());

    sleep(Duration::from_millis(300)).await;
    let sally = WalletStorage::open(&sally_db).unwrap();
    assert_eq!(sally.balance().unwrap(), 100);
}

#[tokio::test]
async fn registered_wait_catches_a_reply_that_beats_the_await() {
    let network = start_network().await;

    let client = MessageClient::new(&network.push_addr, &network.subscribe_addr);
    let subscription = client.subscribe().await.unwrap();
    let (dispatcher, mut fallback, _drain) = MessageDispatcher::spawn(subscription);

    // Waiter registered before the reply exists, awaited only after the
    // reply has already been relayed.
    let wait = dispatcher.register(42, CommandKind::RequestSendReply);
    let witness = CompressedPoint::compress(&commit(0, &random_scalar())).unwrap();
    client
        .publish(&CoordinationMessage::RequestSendReply {
            tx: TxRef { id: 42 },
            witness,
        })
        .await
        .unwrap();
    sleep(Duration::from_millis(200)).await;

    let reply = wait.recv(Duration::from_secs(1)).await.unwrap();
    assert_eq!(reply.tx_id(), 42);
    assert_eq!(reply.command(), CommandKind::RequestSendReply);
    // The reply went to the waiter, not the fallback channel.
    assert!(fallback.try_recv().is_err());
}

#[tokio::test]
async fn send_with_no_receiver_times_out_and_rolls_back() {
    let network = start_network().await;

    let harry = WalletStorage::open_in_memory().unwrap();
    mint(&network, &harry, 100).await;

    let client = MessageClient::new(&network.push_addr, &network.subscribe_addr);
    let subscription = client.subscribe().await.unwrap();
    let (dispatcher, _fallback, _drain) = MessageDispatcher::spawn(subscription);

    let result = send_transaction(
        &harry,
        &client,
        &dispatcher,
        "nobody",
        10,
        Duration::from_millis(200),
    )
    .await;
    assert!(matches!(
        result,
        Err(WalletError::Message(MessageError::Timeout { .. }))
    ));

    // The pending change row is gone and the balance is untouched.
    assert_eq!(harry.balance().unwrap(), 100);
    assert_eq!(harry.all_outputs().unwrap().len(), 1);
    assert_eq!(network.store.lock().await.count(), 1);
}

#[tokio::test]
async fn overspending_fails_before_any_network_traffic() {
    let network = start_network().await;
    let harry = WalletStorage::open_in_memory().unwrap();
    mint(&network, &harry, 5).await;

    let client = MessageClient::new(&network.push_addr, &network.subscribe_addr);
    let subscription = client.subscribe().await.unwrap();
    let (dispatcher, _fallback, _drain) = MessageDispatcher::spawn(subscription);

    let result = send_transaction(&harry, &client, &dispatcher, "sally", 6, EXCHANGE_TIMEOUT).await;
    assert!(matches!(result, Err(WalletError::InsufficientFunds(_))));

    let zero = send_transaction(&harry, &client, &dispatcher, "sally", 0, EXCHANGE_TIMEOUT).await;
    assert!(matches!(zero, Err(WalletError::InvalidArgument(_))));
}
