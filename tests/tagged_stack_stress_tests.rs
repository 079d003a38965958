#[cfg(test)]
mod tagged_stack_stress_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use rstest::rstest;
    use urchin::{StackNode, TaggedStack};

    // Reclamation contract: popped nodes must not be freed while sibling
    // threads may still hold a stale snapshot of them, so the concurrent
    // tests below collect popped boxes and only consume them after every
    // thread has joined.

    #[test]
    fn test_lifo_order_sequential() {
        let stack = TaggedStack::new();
        let count = 1000;

        for i in 0..count {
            stack.push(StackNode::new(i));
        }

        // Pushes p1..pn with no interleaved pops come back pn..p1.
        for i in (0..count).rev() {
            let node = stack.pop().expect("stack should hold remaining values");
            assert_eq!(node.into_data(), i);
        }

        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_empty_pop_is_signal_not_fault() {
        let stack: TaggedStack<usize> = TaggedStack::new();

        for _ in 0..100 {
            assert!(stack.pop().is_none());
        }

        stack.push(StackNode::new(1));
        assert_eq!(stack.pop().unwrap().into_data(), 1);

        // Back to empty: still the plain empty signal, never a stale node.
        for _ in 0..100 {
            assert!(stack.pop().is_none());
        }
    }

    #[rstest]
    #[case(2, 10_000)]
    #[case(4, 10_000)]
    #[case(8, 5_000)]
    fn test_concurrent_push_then_pop_multiset(
        #[case] num_threads: usize,
        #[case] values_per_thread: usize,
    ) {
        let stack = Arc::new(TaggedStack::new());
        let barrier = Arc::new(Barrier::new(num_threads));

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let stack = Arc::clone(&stack);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();

                    for i in 0..values_per_thread {
                        stack.push(StackNode::new(t * values_per_thread + i));
                    }

                    // Every thread finishes its pushes before its pops, so
                    // completed pushes always outnumber completed pops and
                    // no pop here can see an empty stack.
                    let mut popped = Vec::with_capacity(values_per_thread);
                    for _ in 0..values_per_thread {
                        let node = stack.pop().expect("more pushes than pops have completed");
                        popped.push(node);
                    }
                    popped
                })
            })
            .collect();

        let mut popped_nodes = Vec::new();
        for handle in handles {
            popped_nodes.extend(handle.join().unwrap());
        }

        // Conservation: the popped multiset equals the pushed multiset and
        // the stack ends empty.
        assert!(stack.pop().is_none());
        assert!(stack.is_empty());

        let mut all_popped: Vec<usize> = popped_nodes
            .into_iter()
            .map(StackNode::into_data)
            .collect();
        all_popped.sort_unstable();
        let expected: Vec<usize> = (0..num_threads * values_per_thread).collect();
        assert_eq!(all_popped, expected);
    }

    #[test]
    fn test_concurrent_mixed_push_pop_conservation() {
        let stack = Arc::new(TaggedStack::new());
        let num_threads = 8;
        let ops_per_thread = 20_000;

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || {
                    let mut pushed = 0usize;
                    let mut popped = Vec::new();
                    for i in 0..ops_per_thread {
                        if (t + i) % 2 == 0 {
                            stack.push(StackNode::new(t * ops_per_thread + i));
                            pushed += 1;
                        } else if let Some(node) = stack.pop() {
                            popped.push(node);
                        }
                    }
                    (pushed, popped)
                })
            })
            .collect();

        let mut total_pushed = 0;
        let mut popped_nodes = Vec::new();
        for handle in handles {
            let (pushed, popped) = handle.join().unwrap();
            total_pushed += pushed;
            popped_nodes.extend(popped);
        }

        // Drain the remainder; pops plus leftovers must equal pushes.
        while let Some(node) = stack.pop() {
            popped_nodes.push(node);
        }
        assert!(stack.is_empty());
        assert_eq!(popped_nodes.len(), total_pushed);

        // Each pushed value came back exactly once, uncorrupted.
        let mut values: Vec<usize> = popped_nodes
            .into_iter()
            .map(StackNode::into_data)
            .collect();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), total_pushed);
    }

    #[test]
    fn test_aba_churn_pop_repush_same_nodes() {
        // Many threads pop a node and immediately push the same allocation
        // back - a continuous stream of the pop-then-repush cycle the
        // counted pointer exists to survive. Without the generation the
        // head CAS can splice a node out twice and lose part of the chain.
        let stack = Arc::new(TaggedStack::new());
        let node_count = 10;
        let num_threads = 16;
        let iterations = 50_000;

        for i in 0..node_count {
            stack.push(StackNode::new(i));
        }
        let generation_before = stack.generation();

        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || {
                    for _ in 0..iterations {
                        if let Some(node) = stack.pop() {
                            stack.push(node);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Exactly the original nodes survive, each value exactly once.
        let mut drained = Vec::new();
        while let Some(node) = stack.pop() {
            drained.push(node.into_data());
        }
        drained.sort_unstable();
        let expected: Vec<usize> = (0..node_count).collect();
        assert_eq!(drained, expected);

        // Every successful pop advanced the generation.
        assert!(stack.generation() > generation_before);
    }

    #[test]
    fn test_memory_ordering_push_publishes_payload() {
        // A payload written before push must be visible to the popper with
        // no synchronization besides the stack's own head CAS edge.
        for _ in 0..200 {
            let stack = Arc::new(TaggedStack::new());
            let data = Arc::new(AtomicUsize::new(0));

            let producer_stack = Arc::clone(&stack);
            let producer_data = Arc::clone(&data);
            let producer = thread::spawn(move || {
                producer_data.store(42, Ordering::Relaxed);
                producer_stack.push(StackNode::new(1));
            });

            let consumer = thread::spawn(move || loop {
                if let Some(node) = stack.pop() {
                    assert_eq!(node.into_data(), 1);
                    // Happens-before via push (Release CAS) -> pop (Acquire).
                    assert_eq!(data.load(Ordering::Relaxed), 42);
                    break;
                }
                thread::yield_now();
            });

            producer.join().unwrap();
            consumer.join().unwrap();
        }
    }

    #[test]
    fn test_drop_reclaims_linked_nodes() {
        struct CountsDrops(Arc<AtomicUsize>);
        impl Drop for CountsDrops {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let stack = TaggedStack::new();
            for _ in 0..100 {
                stack.push(StackNode::new(CountsDrops(Arc::clone(&drops))));
            }

            // Pop some; their payloads drop as the boxes go out of scope.
            for _ in 0..40 {
                stack.pop().unwrap();
            }
            assert_eq!(drops.load(Ordering::Relaxed), 40);
        }

        // Stack teardown frees the 60 still-linked nodes.
        assert_eq!(drops.load(Ordering::Relaxed), 100);
    }
}
