// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates using `memoize` to prevent a thundering herd on a slow user lookup.
//!
//! Concurrent requests for the same user share a single database query. Later requests are
//! served from the cache until the entry is invalidated, after which the next request queries
//! again.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use memoflight::{CallArgs, Memoized};

#[tokio::main]
async fn main() {
    // Track how many times the database is actually queried
    let query_count = Arc::new(AtomicUsize::new(0));

    let (lookup, invalidator) = Memoized::builder({
        let query_count = Arc::clone(&query_count);
        move |args: CallArgs| {
            let count = query_count.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                println!("  Querying the database for {args}... (query #{count})");

                // Simulate an expensive database query
                tokio::time::sleep(Duration::from_millis(500)).await;

                Ok::<_, String>("UserData(name: Alice, age: 30)".to_string())
            }
        }
    })
    .name("user_lookup")
    .build();

    let user = CallArgs::new().arg(123).named("fields", "profile");

    println!("Starting 5 concurrent requests for {user}...\n");

    let mut handles = Vec::new();
    for i in 1..=5 {
        let lookup = lookup.clone();
        let user = user.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let result = lookup.call(user).await;
            let elapsed = start.elapsed();
            println!("  [Request {i}] Got result in {elapsed:?}: {result:?}");
        });

        handles.push(handle);

        // Stagger the requests slightly to see the coalescing in action
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    println!("\nA later request is served from the cache:");
    let start = tokio::time::Instant::now();
    let result = lookup.call(user.clone()).await;
    println!("  Got result in {:?}: {result:?}", start.elapsed());

    println!("\nAfter invalidation the next request queries again:");
    invalidator.invalidate(&user);
    let result = lookup.call(user).await;
    println!("  Got result: {result:?}");

    let total_queries = query_count.load(Ordering::SeqCst);
    println!("\nDone! The database was queried {total_queries} time(s) for 7 requests.");
}
